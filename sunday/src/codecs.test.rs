use super::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_find_unregistered_type_fails() {
    let encoders = MediaTypeEncoders::default_registry();
    let video = "video/mp4".parse::<MediaType>().unwrap();
    assert_matches!(
        encoders.find(&video),
        Err(RequestEncodingError::UnsupportedContentType(mt)) if mt == video
    );

    let decoders = MediaTypeDecoders::default_registry();
    assert_matches!(
        decoders.find(&video),
        Err(ResponseDecodingError::UnsupportedContentType(mt)) if mt == video
    );
}

#[test]
fn test_first_registration_wins() {
    #[derive(Debug)]
    struct FixedCodec(&'static [u8]);
    impl MediaTypeEncoder for FixedCodec {
        fn encode_value(&self, _: &Value) -> Result<Bytes, CodecError> {
            Ok(Bytes::from_static(self.0))
        }
    }

    let encoders = MediaTypeEncoders::builder()
        .register(MediaType::json(), Arc::new(FixedCodec(b"first")))
        .register(MediaType::json(), Arc::new(FixedCodec(b"second")))
        .build();
    let encoded = encoders.encode(&MediaType::json(), &json!({})).unwrap();
    assert_eq!(&encoded[..], b"first");
}

#[test]
fn test_json_round_trip() {
    let encoders = MediaTypeEncoders::default_registry();
    let decoders = MediaTypeDecoders::default_registry();

    let value = json!({"a": 1, "b": 2.0, "d": "Hello", "e": ["World"]});
    let encoded = encoders.encode(&MediaType::json(), &value).unwrap();
    let decoded: Value = decoders.decode(&MediaType::json(), &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_cbor_round_trip() {
    let encoders = MediaTypeEncoders::default_registry();
    let decoders = MediaTypeDecoders::default_registry();

    let value = json!({"a": 1, "d": "Hello", "e": ["World"], "f": true});
    let encoded = encoders.encode(&MediaType::cbor(), &value).unwrap();
    let decoded: Value = decoders.decode(&MediaType::cbor(), &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_text_codec_matches_any_text_subtype() {
    let encoders = MediaTypeEncoders::default_registry();
    let decoders = MediaTypeDecoders::default_registry();

    let encoded = encoders.encode(&MediaType::plain(), &"Hello").unwrap();
    assert_eq!(&encoded[..], b"Hello");

    let decoded: String = decoders.decode(&MediaType::html(), b"<p>Hi</p>").unwrap();
    assert_eq!(decoded, "<p>Hi</p>");
}

#[test]
fn test_text_codec_rejects_non_string() {
    let encoders = MediaTypeEncoders::default_registry();
    let err = encoders.encode(&MediaType::plain(), &5).unwrap_err();
    assert_matches!(
        err,
        RequestEncodingError::SerializationFailed { content_type, source }
            if content_type == MediaType::plain()
                && source.to_string().contains("translation of number values is not supported")
    );
}

#[test]
fn test_binary_codec_round_trips_bytes() {
    let encoders = MediaTypeEncoders::default_registry();
    let decoders = MediaTypeDecoders::default_registry();

    let payload: Vec<u8> = vec![0, 127, 255];
    let encoded = encoders.encode(&MediaType::octet_stream(), &payload).unwrap();
    assert_eq!(&encoded[..], &[0u8, 127, 255][..]);

    let decoded: Vec<u8> = decoders
        .decode(&MediaType::octet_stream(), &encoded)
        .unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn test_binary_codec_rejects_non_bytes() {
    let encoders = MediaTypeEncoders::default_registry();
    assert_matches!(
        encoders.encode(&MediaType::octet_stream(), &json!({"a": 1})),
        Err(RequestEncodingError::SerializationFailed { .. })
    );
}

#[test]
fn test_problem_json_uses_json_codec() {
    let decoders = MediaTypeDecoders::default_registry();
    let decoded: Value = decoders
        .decode(&MediaType::problem_json(), br#"{"status":400}"#)
        .unwrap();
    assert_eq!(decoded, json!({"status": 400}));
}

#[test]
fn test_form_encoder_registered_for_queries() {
    let encoders = MediaTypeEncoders::default_registry();
    let encoded = encoders
        .encode(&MediaType::www_form_url_encoded(), &json!({"a": 1, "b": "x y"}))
        .unwrap();
    assert_eq!(&encoded[..], b"a=1&b=x%20y");
}

#[test]
fn test_decoder_type_mismatch_is_deserialization_failure() {
    let decoders = MediaTypeDecoders::default_registry();
    let err = decoders
        .decode::<u32>(&MediaType::json(), br#"{"a":1}"#)
        .unwrap_err();
    assert_matches!(err, ResponseDecodingError::DeserializationFailed { .. });
}
