use super::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("parameters must be an object"),
    }
}

#[test]
fn test_expands_placeholders_in_order() {
    let template = UriTemplate::new("http://example.com");
    let url = template
        .complete(
            "/v{x}/devices/{d}/messages/{m}/payloads",
            &params(json!({"x": 1, "d": 123, "m": 456})),
        )
        .unwrap();
    assert_eq!(url.path(), "/v1/devices/123/messages/456/payloads");
}

#[test]
fn test_missing_parameter_fails() {
    let template = UriTemplate::new("http://example.com");
    let err = template
        .complete("/items/{id}", &Map::new())
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::RequestEncoding(RequestEncodingError::MissingParameter(name)) if name == "id"
    );
}

#[test]
fn test_unsupported_parameter_type_fails() {
    let template = UriTemplate::new("http://example.com");
    let err = template
        .complete("/items/{id}", &params(json!({"id": [1, 2]})))
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::RequestEncoding(RequestEncodingError::UnsupportedParameterType { name, kind })
            if name == "id" && kind == "array"
    );
}

#[test]
fn test_defaults_are_overridable() {
    let template = UriTemplate::new("http://example.com/api/v{ver}")
        .with_default("ver", json!(1));

    let url = template.complete("/status", &Map::new()).unwrap();
    assert_eq!(url.as_str(), "http://example.com/api/v1/status");

    let url = template
        .complete("/status", &params(json!({"ver": 2})))
        .unwrap();
    assert_eq!(url.as_str(), "http://example.com/api/v2/status");
}

#[test]
fn test_custom_converter_takes_precedence() {
    let template = UriTemplate::new("http://example.com")
        .with_converter(ValueKind::Bool, |v| {
            v.as_bool().map(|b| if b { "yes" } else { "no" }.to_string())
        });
    let url = template
        .complete("/flags/{f}", &params(json!({"f": true})))
        .unwrap();
    assert_eq!(url.path(), "/flags/yes");
}

#[test]
fn test_converter_for_composite_kind() {
    let template = UriTemplate::new("http://example.com")
        .with_converter(ValueKind::Array, |v| {
            v.as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                })
        });
    let url = template
        .complete("/tags/{t}", &params(json!({"t": ["a", "b"]})))
        .unwrap();
    assert_eq!(url.path(), "/tags/a,b");
}

#[test]
fn test_expanded_values_are_percent_encoded() {
    let template = UriTemplate::new("http://example.com");
    let url = template
        .complete("/files/{name}", &params(json!({"name": "a/b c"})))
        .unwrap();
    assert_eq!(url.path(), "/files/a%2Fb%20c");
}

#[test]
fn test_join_respects_trailing_slash() {
    let parameters = Map::new();
    for base in ["http://example.com/api", "http://example.com/api/"] {
        for relative in ["status", "/status"] {
            let url = UriTemplate::new(base).complete(relative, &parameters).unwrap();
            assert_eq!(url.as_str(), "http://example.com/api/status", "{base} + {relative}");
        }
    }
}

#[test]
fn test_empty_relative_keeps_base() {
    let url = UriTemplate::new("http://example.com/api")
        .complete("", &Map::new())
        .unwrap();
    assert_eq!(url.as_str(), "http://example.com/api");
}

#[test]
fn test_invalid_expansion_is_invalid_url() {
    let err = UriTemplate::new("not a url")
        .complete("", &Map::new())
        .unwrap_err();
    assert_matches!(err, SundayError::InvalidUrl(_));
}
