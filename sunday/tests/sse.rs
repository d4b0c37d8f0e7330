//! End-to-end server-sent events tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use sunday::EventDecoders;
use sunday::RequestFactory;
use sunday::RequestSpec;
use sunday::SseError;
use sunday::SundayError;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

#[derive(Debug, Deserialize, PartialEq)]
struct TestEvent {
    some: String,
}

/// Per-connection behavior of the scripted SSE server.
#[derive(Debug, Clone)]
enum Behavior {
    /// Write the body, then close the connection.
    Body(&'static [u8]),
    /// Hold the connection open without sending anything.
    Silent(Duration),
    /// Send comment pings at an interval, then hold.
    Pings { interval: Duration, count: usize },
}

/// Minimal SSE endpoint over a raw TCP listener. Each accepted connection
/// pops the next scripted behavior (idling silently once the script runs
/// out) and reports its received request head, lowercased, on the channel.
async fn sse_server(script: Vec<Behavior>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (head_tx, head_rx) = mpsc::unbounded_channel();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let behavior = script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Behavior::Silent(Duration::from_secs(60)));
            let head_tx = head_tx.clone();
            tokio::spawn(handle_connection(socket, behavior, head_tx));
        }
    });

    (format!("http://{addr}"), head_rx)
}

async fn handle_connection(
    mut socket: TcpStream,
    behavior: Behavior,
    head_tx: mpsc::UnboundedSender<String>,
) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if socket.read_exact(&mut byte).await.is_err() {
            return;
        }
        head.push(byte[0]);
    }
    let _ = head_tx.send(String::from_utf8_lossy(&head).to_lowercase());

    let response_head = b"HTTP/1.1 200 OK\r\n\
        Content-Type: text/event-stream\r\n\
        Cache-Control: no-cache\r\n\
        Connection: close\r\n\r\n";
    if socket.write_all(response_head).await.is_err() {
        return;
    }
    let _ = socket.flush().await;

    match behavior {
        Behavior::Body(bytes) => {
            let _ = socket.write_all(bytes).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Behavior::Silent(hold) => {
            tokio::time::sleep(hold).await;
        }
        Behavior::Pings { interval, count } => {
            for _ in 0..count {
                tokio::time::sleep(interval).await;
                if socket.write_all(b": ping\n").await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_typed_event_stream_decodes_named_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"event: test\nid: 123\ndata: {\"some\":\r\ndata: \"test data\"}\n\n".to_vec(),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let factory = RequestFactory::builder(server.uri()).build().unwrap();
    let mut stream = factory.event_stream(
        RequestSpec::get("/events"),
        EventDecoders::<TestEvent>::new().json("test"),
    );

    let value = stream.next().await.unwrap().unwrap();
    assert_eq!(
        value,
        TestEvent {
            some: "test data".into()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_sends_last_event_id() {
    let (uri, mut heads) = sse_server(vec![
        Behavior::Body(b"id: 123\ndata: tester\n\n"),
        Behavior::Silent(Duration::from_secs(60)),
    ])
    .await;

    let factory = RequestFactory::builder(uri).build().unwrap();
    let source = factory.event_source(RequestSpec::get("/events"));
    source.connect();

    tokio::time::sleep(Duration::from_millis(500)).await;
    source.close();

    let first = heads.recv().await.unwrap();
    assert!(!first.contains("last-event-id"), "first connect carries no id");
    let second = heads.recv().await.unwrap();
    assert!(
        second.contains("last-event-id: 123"),
        "reconnect must resume from the last event id: {second}"
    );
    assert_eq!(source.last_event_id().as_deref(), Some("123"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inactivity_timeout_fires_on_silent_connection() {
    let (uri, _heads) = sse_server(vec![Behavior::Silent(Duration::from_secs(60))]).await;

    let factory = RequestFactory::builder(uri).build().unwrap();
    let source = factory.event_source_with_timeout(
        RequestSpec::get("/events"),
        Duration::from_millis(500),
        Duration::from_millis(100),
    );

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    source.on_error(move |error| {
        if let SundayError::Sse(sse) = error {
            let _ = error_tx.send(sse.clone());
        }
    });
    source.connect();

    let error = tokio::time::timeout(Duration::from_millis(800), error_rx.recv())
        .await
        .expect("timeout waiting for EventTimeout")
        .unwrap();
    assert_eq!(error, SseError::EventTimeout);
    source.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_comment_pings_reset_the_inactivity_timer() {
    let (uri, _heads) = sse_server(vec![Behavior::Pings {
        interval: Duration::from_millis(200),
        count: 8,
    }])
    .await;

    let factory = RequestFactory::builder(uri).build().unwrap();
    let source = factory.event_source_with_timeout(
        RequestSpec::get("/events"),
        Duration::from_millis(500),
        Duration::from_millis(100),
    );

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    source.on_error(move |error| {
        if let SundayError::Sse(sse) = error {
            let _ = error_tx.send(sse.clone());
        }
    });
    source.connect();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    source.close();

    assert!(
        error_rx.try_recv().is_err(),
        "pings must keep the watchdog quiet"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_event_source_requests_event_stream_media_type() {
    let (uri, mut heads) = sse_server(vec![Behavior::Silent(Duration::from_secs(60))]).await;

    let factory = RequestFactory::builder(uri).build().unwrap();
    let source = factory.event_source(RequestSpec::get("/events"));
    source.connect();

    tokio::time::sleep(Duration::from_millis(200)).await;
    source.close();

    let head = heads.recv().await.unwrap();
    assert!(head.contains("accept: text/event-stream"), "{head}");
}
