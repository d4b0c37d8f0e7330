use super::*;
use assert_matches::assert_matches;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

fn factory() -> RequestFactory {
    RequestFactory::builder("http://example.com/api").build().unwrap()
}

#[tokio::test]
async fn test_url_expansion_and_query() {
    let request = factory()
        .request(
            &RequestSpec::get("/v{x}/items/{id}")
                .path_param("x", 1)
                .path_param("id", 123)
                .query_param("limit", 5)
                .query_param("flag", true),
        )
        .await
        .unwrap();

    assert_eq!(request.url.path(), "/api/v1/items/123");
    assert_eq!(request.url.query(), Some("flag=1&limit=5"));
}

#[tokio::test]
async fn test_accept_header_preserves_wire_format() {
    let request = factory()
        .request(
            &RequestSpec::get("/items")
                .accept_types(vec![MediaType::json(), MediaType::cbor()]),
        )
        .await
        .unwrap();

    assert_eq!(
        request.headers.get(ACCEPT).unwrap(),
        "application/json , application/cbor"
    );
}

#[tokio::test]
async fn test_accept_intersects_with_registered_decoders() {
    // Only CBOR is registered; JSON is filtered out of the Accept header.
    let factory = RequestFactory::builder("http://example.com")
        .media_type_decoders(
            MediaTypeDecoders::builder()
                .register(MediaType::cbor(), Arc::new(crate::codecs::CborCodec))
                .build(),
        )
        .build()
        .unwrap();

    let request = factory
        .request(
            &RequestSpec::get("/items")
                .accept_types(vec![MediaType::json(), MediaType::cbor()]),
        )
        .await
        .unwrap();
    assert_eq!(request.headers.get(ACCEPT).unwrap(), "application/cbor");
}

#[tokio::test]
async fn test_no_supported_accept_types_fails() {
    let video = "video/mp4".parse::<MediaType>().unwrap();
    let err = factory()
        .request(&RequestSpec::get("/items").accept_types(vec![video.clone()]))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::RequestEncoding(RequestEncodingError::NoSupportedAcceptTypes(types))
            if types == vec![video]
    );
}

#[tokio::test]
async fn test_body_uses_first_supported_content_type() {
    let request = factory()
        .request(
            &RequestSpec::post("/items")
                .body(json!({"a": 1}))
                .content_types(vec![
                    "video/mp4".parse().unwrap(),
                    MediaType::json(),
                    MediaType::cbor(),
                ]),
        )
        .await
        .unwrap();

    assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(&request.body.unwrap()[..], br#"{"a":1}"#);
}

#[tokio::test]
async fn test_no_supported_content_types_fails() {
    let video: MediaType = "video/mp4".parse().unwrap();
    let err = factory()
        .request(
            &RequestSpec::post("/items")
                .body(json!({"a": 1}))
                .content_types(vec![video.clone()]),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::RequestEncoding(RequestEncodingError::NoSupportedContentTypes(types))
            if types == vec![video]
    );
}

#[tokio::test]
async fn test_body_without_content_types_fails() {
    let err = factory()
        .request(
            &RequestSpec::post("/items")
                .body(json!({"a": 1}))
                .content_types(Vec::new()),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::RequestEncoding(RequestEncodingError::NoSupportedContentTypes(types))
            if types.is_empty()
    );
}

#[tokio::test]
async fn test_caller_supplied_content_type_wins() {
    let request = factory()
        .request(
            &RequestSpec::post("/items")
                .body(json!({"a": 1}))
                .header("Content-Type", "application/json;charset=utf-8"),
        )
        .await
        .unwrap();

    let values: Vec<_> = request.headers.get_all(CONTENT_TYPE).iter().collect();
    assert_eq!(values, vec!["application/json;charset=utf-8"]);
}

#[tokio::test]
async fn test_extra_headers_append_multi_valued() {
    let request = factory()
        .request(&RequestSpec::get("/items").header("x-tag", json!(["a", "b"])))
        .await
        .unwrap();
    let values: Vec<_> = request.headers.get_all("x-tag").iter().collect();
    assert_eq!(values, vec!["a", "b"]);
}

#[tokio::test]
async fn test_default_user_agent_is_set_unless_overridden() {
    let request = factory().request(&RequestSpec::get("/items")).await.unwrap();
    assert!(
        request
            .headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("sunday-rust/")
    );

    let request = factory()
        .request(&RequestSpec::get("/items").header("User-Agent", "custom/1.0"))
        .await
        .unwrap();
    let values: Vec<_> = request.headers.get_all(USER_AGENT).iter().collect();
    assert_eq!(values, vec!["custom/1.0"]);
}

#[tokio::test]
async fn test_get_request_has_no_body_or_content_type() {
    let request = factory().request(&RequestSpec::get("/items")).await.unwrap();
    assert!(request.body.is_none());
    assert!(request.headers.get(CONTENT_TYPE).is_none());
}

struct TagAdapter(&'static str);

#[async_trait]
impl RequestAdapter for TagAdapter {
    async fn adapt(&self, _: &RequestFactory, request: HttpRequest) -> Result<HttpRequest> {
        let mut request = request;
        request
            .headers
            .append("x-chain", HeaderValue::from_static(self.0));
        Ok(request)
    }
}

struct FailingAdapter;

#[async_trait]
impl RequestAdapter for FailingAdapter {
    async fn adapt(&self, _: &RequestFactory, _: HttpRequest) -> Result<HttpRequest> {
        Err(SundayError::TokenRefreshFailed("boom".into()))
    }
}

#[tokio::test]
async fn test_adapters_run_in_registration_order() {
    let factory = RequestFactory::builder("http://example.com")
        .adapter(Arc::new(TagAdapter("first")))
        .adapter(Arc::new(TagAdapter("second")))
        .build()
        .unwrap();

    let request = factory.request(&RequestSpec::get("/")).await.unwrap();
    let values: Vec<_> = request.headers.get_all("x-chain").iter().collect();
    assert_eq!(values, vec!["first", "second"]);
}

#[tokio::test]
async fn test_adapter_failure_short_circuits() {
    let factory = RequestFactory::builder("http://example.com")
        .adapter(Arc::new(FailingAdapter))
        .adapter(Arc::new(TagAdapter("unreachable")))
        .build()
        .unwrap();

    let err = factory.request(&RequestSpec::get("/")).await.unwrap_err();
    assert_matches!(err, SundayError::TokenRefreshFailed(message) if message == "boom");
}
