//! End-to-end request/response tests against a mock server.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use futures::StreamExt;
use http::Method;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use sunday::DataEvent;
use sunday::HttpRequest;
use sunday::MediaType;
use sunday::NetworkSession;
use sunday::Problem;
use sunday::ProblemType;
use sunday::RequestFactory;
use sunday::RequestSpec;
use sunday::ResponseDecodingError;
use sunday::SessionConfiguration;
use sunday::SundayError;
use sunday::codecs::CborCodec;
use sunday::codecs::MediaTypeDecoders;
use sunday::codecs::MediaTypeEncoders;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AnyValue {
    a: i64,
    b: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    c: DateTime<Utc>,
    d: String,
    e: Vec<String>,
}

fn any_value() -> AnyValue {
    AnyValue {
        a: 1,
        b: 2.0,
        c: Utc.timestamp_millis_opt(1_234_567_890_123).unwrap(),
        d: "Hello".to_string(),
        e: vec!["World".to_string()],
    }
}

#[tokio::test]
async fn test_post_echo_adapts_content_and_accept_types() {
    let value = any_value();
    let encoders = MediaTypeEncoders::default_registry();

    for content_type in [MediaType::json(), MediaType::cbor()] {
        for accept_type in [MediaType::json(), MediaType::cbor()] {
            let server = MockServer::start().await;
            let echoed = encoders.encode(&accept_type, &value).unwrap();
            Mock::given(method("POST"))
                .and(path("/echo"))
                .and(header("Content-Type", content_type.to_string().as_str()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_raw(echoed.to_vec(), &accept_type.to_string()),
                )
                .mount(&server)
                .await;

            let factory = RequestFactory::builder(server.uri()).build().unwrap();
            let result: AnyValue = factory
                .result(
                    &RequestSpec::post("/echo")
                        .body(serde_json::to_value(&value).unwrap())
                        .content_types(vec![content_type.clone()])
                        .accept_types(vec![accept_type.clone()]),
                )
                .await
                .unwrap();

            assert_eq!(result, value, "{content_type} -> {accept_type}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Item {
    name: String,
    cost: f64,
}

#[tokio::test]
async fn test_get_list_decodes_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/something"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "abc", "cost": 12.8},
            {"name": "def", "cost": 6.4},
        ])))
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    let items: Vec<Item> = factory
        .result(&RequestSpec::get("/{type}").path_param("type", "something"))
        .await
        .unwrap();

    assert_eq!(
        items,
        vec![
            Item { name: "abc".into(), cost: 12.8 },
            Item { name: "def".into(), cost: 6.4 },
        ]
    );
}

#[derive(Debug, Deserialize)]
struct TestProblem {
    #[serde(rename = "type")]
    type_: Url,
    status: u16,
    extra: String,
}

impl fmt::Display for TestProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test problem: status {}, extra {}", self.status, self.extra)
    }
}

impl std::error::Error for TestProblem {}

impl ProblemType for TestProblem {
    fn type_uri(&self) -> &str {
        self.type_.as_str()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn problem_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/problem"))
        .respond_with(ResponseTemplate::new(400).set_body_raw(
            serde_json::to_vec(&json!({
                "type": "http://example.com/test",
                "title": "Test Problem",
                "status": 400,
                "detail": "A Test Problem",
                "extra": "Some Extra",
            }))
            .unwrap(),
            "application/problem+json",
        ))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_registered_problem_type_surfaces_concrete_subtype() {
    let server = problem_server().await;
    let factory = RequestFactory::builder(server.uri())
        .problem_type::<TestProblem>("http://example.com/test")
        .build()
        .unwrap();

    let err = factory
        .result::<serde_json::Value>(&RequestSpec::get("/problem"))
        .await
        .unwrap_err();

    let problem = err.problem_as::<TestProblem>().expect("expected TestProblem");
    assert_eq!(problem.extra, "Some Extra");
    assert_eq!(problem.status, 400);
}

#[tokio::test]
async fn test_unregistered_problem_type_surfaces_generic_problem() {
    let server = problem_server().await;
    let factory = RequestFactory::builder(server.uri()).build().unwrap();

    let err = factory
        .result::<serde_json::Value>(&RequestSpec::get("/problem"))
        .await
        .unwrap_err();

    let problem = err.problem_as::<Problem>().expect("expected generic Problem");
    assert_eq!(problem.type_.as_str(), "http://example.com/test");
    assert_eq!(problem.title.as_deref(), Some("Test Problem"));
    assert_eq!(problem.detail.as_deref(), Some("A Test Problem"));
    assert_eq!(problem.parameters.get("extra"), Some(&json!("Some Extra")));
}

#[tokio::test]
async fn test_error_response_without_problem_body_becomes_generic_problem() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(400).set_body_raw("<html>nope</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    let err = factory
        .result::<serde_json::Value>(&RequestSpec::get("/broken"))
        .await
        .unwrap_err();

    let problem = err.problem_as::<Problem>().expect("expected generic Problem");
    assert_eq!(problem.type_.as_str(), "about:blank");
    assert_eq!(problem.status, 400);
    assert_eq!(problem.title.as_deref(), Some("Bad Request"));
}

#[tokio::test]
async fn test_content_negotiation_requires_registered_decoder() {
    let cbor_only = || {
        MediaTypeDecoders::builder()
            .register(MediaType::cbor(), Arc::new(CborCodec))
            .build()
    };
    let value = any_value();
    let encoders = MediaTypeEncoders::default_registry();

    // Response arrives as JSON although only CBOR is decodable.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            encoders.encode(&MediaType::json(), &value).unwrap().to_vec(),
            "application/json",
        ))
        .mount(&server)
        .await;
    let factory = RequestFactory::builder(server.uri())
        .media_type_decoders(cbor_only())
        .build()
        .unwrap();
    let err = factory
        .result::<AnyValue>(
            &RequestSpec::get("/item").accept_types(vec![MediaType::json(), MediaType::cbor()]),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::ResponseDecoding(ResponseDecodingError::UnsupportedContentType(mt))
            if mt == MediaType::json()
    );

    // The same response as CBOR decodes normally.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            encoders.encode(&MediaType::cbor(), &value).unwrap().to_vec(),
            "application/cbor",
        ))
        .mount(&server)
        .await;
    let factory = RequestFactory::builder(server.uri())
        .media_type_decoders(cbor_only())
        .build()
        .unwrap();
    let decoded: AnyValue = factory
        .result(
            &RequestSpec::get("/item").accept_types(vec![MediaType::json(), MediaType::cbor()]),
        )
        .await
        .unwrap();
    assert_eq!(decoded, value);
}

#[tokio::test]
async fn test_unacceptable_status_is_response_validation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fail"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    let err = factory
        .result::<serde_json::Value>(&RequestSpec::get("/fail"))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SundayError::ResponseValidation { status, .. } if status.as_u16() == 500
    );
}

#[tokio::test]
async fn test_empty_body_decodes_into_unit() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    factory
        .result::<()>(&RequestSpec::delete("/items/1"))
        .await
        .unwrap();

    let err = factory
        .result::<Item>(&RequestSpec::delete("/items/1"))
        .await
        .unwrap_err();
    assert_matches!(err, SundayError::UnexpectedEmptyResponse);
}

#[tokio::test]
async fn test_result_response_surfaces_status_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-request-id", "r-1")
                .set_body_json(json!({"name": "abc", "cost": 1.0})),
        )
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    let (item, head) = factory
        .result_response::<Item>(&RequestSpec::get("/item"))
        .await
        .unwrap();
    assert_eq!(item.name, "abc");
    assert_eq!(head.status.as_u16(), 201);
    assert_eq!(head.headers.get("x-request-id").unwrap(), "r-1");
}

/// Serve one connection with a chunked body of `count` chunks of
/// `size` bytes, then an empty terminating chunk.
async fn chunked_server(count: usize, size: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if socket.read_exact(&mut byte).await.is_err() {
                return;
            }
            head.push(byte[0]);
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: application/octet-stream\r\n\
                  Transfer-Encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        for _ in 0..count {
            let chunk = vec![b'x'; size];
            socket
                .write_all(format!("{size:x}\r\n").as_bytes())
                .await
                .unwrap();
            socket.write_all(&chunk).await.unwrap();
            socket.write_all(b"\r\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_data_event_stream_delivers_chunks_in_order() {
    let uri = chunked_server(4, 1000).await;
    let session = NetworkSession::new(SessionConfiguration::default()).unwrap();
    let request = HttpRequest::new(Method::GET, Url::parse(&format!("{uri}/data")).unwrap());

    let mut stream = session.data_event_stream(request).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_matches!(first, DataEvent::Connect(head) if head.status.as_u16() == 200);

    let mut chunks = Vec::new();
    while let Some(event) = stream.next().await {
        match event.unwrap() {
            DataEvent::Data(data) => chunks.push(data.len()),
            DataEvent::Connect(_) => panic!("connect must be emitted exactly once"),
        }
    }
    assert_eq!(chunks, vec![1000, 1000, 1000, 1000]);
}
