use super::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[test]
fn test_scalars_coerce_to_strings() {
    let headers = encode_headers(&object(json!({
        "x-text": "abc",
        "x-number": 42,
        "x-flag": true,
    })))
    .unwrap();
    assert_eq!(headers.get("x-text").unwrap(), "abc");
    assert_eq!(headers.get("x-number").unwrap(), "42");
    assert_eq!(headers.get("x-flag").unwrap(), "true");
}

#[test]
fn test_arrays_expand_to_repeated_entries() {
    let headers = encode_headers(&object(json!({"x-multi": ["a", "b", 3]}))).unwrap();
    let values: Vec<_> = headers.get_all("x-multi").iter().collect();
    assert_eq!(values, vec!["a", "b", "3"]);
}

#[test]
fn test_null_values_are_dropped() {
    let headers = encode_headers(&object(json!({"x-skip": null, "x-keep": "v"}))).unwrap();
    assert!(headers.get("x-skip").is_none());
    assert_eq!(headers.get("x-keep").unwrap(), "v");

    // Null elements inside arrays drop individually.
    let headers = encode_headers(&object(json!({"x-multi": ["a", null, "b"]}))).unwrap();
    assert_eq!(headers.get_all("x-multi").iter().count(), 2);
}

#[test]
fn test_composite_values_fail() {
    assert_matches!(
        encode_headers(&object(json!({"x-bad": {"a": 1}}))),
        Err(RequestEncodingError::InvalidHeaderValue(name)) if name == "x-bad"
    );
}

#[test]
fn test_unrepresentable_value_fails() {
    assert_matches!(
        encode_headers(&object(json!({"x-bad": "line\nbreak"}))),
        Err(RequestEncodingError::InvalidHeaderValue(name)) if name == "x-bad"
    );
}
