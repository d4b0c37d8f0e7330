use super::*;
use crate::error::SundayError;
use crate::session::DataEvent;
use crate::session::DataEventStream;
use crate::session::ResponseHead;
use crate::sse::event_source::StreamFactory;
use bytes::Bytes;
use futures::StreamExt;
use http::HeaderMap;
use http::StatusCode;
use pretty_assertions::assert_eq;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct TestEvent {
    some: String,
}

fn one_shot_factory(payload: &'static [u8]) -> StreamFactory {
    Arc::new(move |_headers: HeaderMap| {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                let head = ResponseHead {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                };
                if tx.send(Ok(DataEvent::Connect(head))).await.is_err() {
                    return;
                }
                let _ = tx.send(Ok(DataEvent::Data(Bytes::from_static(payload)))).await;
                // Keep the connection open so the source does not reconnect.
                std::future::pending::<()>().await;
            });
            Ok(Some(DataEventStream::new(rx)))
        })
    })
}

#[tokio::test]
async fn test_registered_events_decode() {
    let factory = one_shot_factory(b"event: test\nid: 123\ndata: {\"some\": \"test data\"}\n\n");
    let source = EventSource::new(factory);
    let mut stream =
        TypedEventStream::new(source, EventDecoders::<TestEvent>::new().json("test"));

    let value = stream.next().await.unwrap().unwrap();
    assert_eq!(
        value,
        TestEvent {
            some: "test data".into()
        }
    );
}

#[tokio::test]
async fn test_unknown_event_names_are_dropped() {
    let factory = one_shot_factory(
        b"event: other\ndata: {\"some\": \"skip\"}\n\nevent: test\ndata: {\"some\": \"keep\"}\n\n",
    );
    let source = EventSource::new(factory);
    let mut stream =
        TypedEventStream::new(source, EventDecoders::<TestEvent>::new().json("test"));

    let value = stream.next().await.unwrap().unwrap();
    assert_eq!(value.some, "keep");
}

#[tokio::test]
async fn test_decode_failures_become_stream_errors() {
    let factory = one_shot_factory(b"event: test\ndata: not json\n\n");
    let source = EventSource::new(factory);
    let mut stream =
        TypedEventStream::new(source, EventDecoders::<TestEvent>::new().json("test"));

    let error = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        SundayError::ResponseDecoding(ResponseDecodingError::DeserializationFailed { .. })
    ));
}

#[tokio::test]
async fn test_close_stops_the_source() {
    let factory = one_shot_factory(b"event: test\ndata: {\"some\": \"x\"}\n\n");
    let source = EventSource::new(factory);
    let stream = TypedEventStream::new(source, EventDecoders::<TestEvent>::new().json("test"));

    stream.close();
    assert_eq!(
        stream.event_source().ready_state(),
        crate::sse::event_source::ReadyState::Closed
    );
}
