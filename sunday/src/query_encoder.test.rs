use super::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

fn encoder() -> WwwFormUrlEncoder {
    WwwFormUrlEncoder::default()
}

#[test]
fn test_simple_pairs() {
    let encoded = encoder().encode(&json!({"name": "abc", "cost": 12.8})).unwrap();
    // serde_json object keys are sorted.
    assert_eq!(encoded, "cost=12.8&name=abc");
}

#[test]
fn test_array_encoding_bracketed() {
    let encoded = encoder().encode(&json!({"a": [1, 2]})).unwrap();
    assert_eq!(encoded, "a[]=1&a[]=2");
}

#[test]
fn test_array_encoding_unbracketed() {
    let encoder = WwwFormUrlEncoder::new(
        ArrayEncoding::Unbracketed,
        BoolEncoding::default(),
        DateEncoding::default(),
    );
    let encoded = encoder.encode(&json!({"a": [1, 2]})).unwrap();
    assert_eq!(encoded, "a=1&a=2");
}

#[test]
fn test_bool_encoding() {
    let encoded = encoder().encode(&json!({"flag": true, "other": false})).unwrap();
    assert_eq!(encoded, "flag=1&other=0");

    let encoder = WwwFormUrlEncoder::new(
        ArrayEncoding::default(),
        BoolEncoding::Literal,
        DateEncoding::default(),
    );
    let encoded = encoder.encode(&json!({"flag": true, "other": false})).unwrap();
    assert_eq!(encoded, "flag=true&other=false");
}

#[test]
fn test_date_encoding_iso8601_truncates_to_millis() {
    let encoded = encoder()
        .encode(&json!({"at": "2024-03-01T12:30:45.123456789Z"}))
        .unwrap();
    assert_eq!(encoded, "at=2024-03-01T12%3A30%3A45.123Z");
}

#[test]
fn test_date_encoding_seconds() {
    let encoder = WwwFormUrlEncoder::new(
        ArrayEncoding::default(),
        BoolEncoding::default(),
        DateEncoding::SecondsSince1970,
    );
    let encoded = encoder.encode(&json!({"at": "1970-01-01T00:00:01.500Z"})).unwrap();
    assert_eq!(encoded, "at=1.500");
}

#[test]
fn test_date_encoding_milliseconds() {
    let encoder = WwwFormUrlEncoder::new(
        ArrayEncoding::default(),
        BoolEncoding::default(),
        DateEncoding::MillisecondsSince1970,
    );
    let encoded = encoder.encode(&json!({"at": "1970-01-01T00:00:01.500Z"})).unwrap();
    assert_eq!(encoded, "at=1500");
}

#[test]
fn test_nested_object_flattens() {
    let encoded = encoder()
        .encode(&json!({"filter": {"name": "abc", "limit": 2}}))
        .unwrap();
    assert_eq!(encoded, "filter[limit]=2&filter[name]=abc");
}

#[test]
fn test_nested_array_in_object() {
    let encoded = encoder()
        .encode(&json!({"filter": {"tags": ["a", "b"]}}))
        .unwrap();
    assert_eq!(encoded, "filter[tags][]=a&filter[tags][]=b");
}

#[test]
fn test_null_is_bare_key() {
    let encoded = encoder().encode(&json!({"flag": null, "x": 1})).unwrap();
    assert_eq!(encoded, "flag&x=1");
}

#[test]
fn test_reserved_marks_pass_through() {
    let encoded = encoder().encode(&json!({"q": "a!'()~b"})).unwrap();
    assert_eq!(encoded, "q=a!'()~b");
}

#[test]
fn test_space_and_reserved_encoded() {
    let encoded = encoder().encode(&json!({"q": "a b&c=d"})).unwrap();
    assert_eq!(encoded, "q=a%20b%26c%3Dd");
}

#[test]
fn test_top_level_must_be_object() {
    assert_matches!(
        encoder().encode(&json!([1, 2])),
        Err(CodecError::TranslationNotSupported { kind: "array" })
    );
    assert_matches!(
        encoder().encode(&json!("text")),
        Err(CodecError::TranslationNotSupported { kind: "string" })
    );
}
