use super::*;
use crate::session::ResponseHead;
use assert_matches::assert_matches;
use bytes::Bytes;
use http::StatusCode;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicUsize;
use tokio::sync::mpsc;

/// Stream factory fed from a script of per-connection chunk lists. Each
/// connection replays one script entry and then ends; when the script is
/// exhausted the factory parks forever on an idle stream.
fn scripted_factory(
    script: Vec<Vec<&'static [u8]>>,
    connect_headers: mpsc::UnboundedSender<HeaderMap>,
) -> StreamFactory {
    let connection = Arc::new(AtomicUsize::new(0));
    Arc::new(move |headers: HeaderMap| {
        let _ = connect_headers.send(headers);
        let index = connection.fetch_add(1, Ordering::SeqCst);
        let chunks = script.get(index).cloned();
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
                match chunks {
                    Some(chunks) => {
                        for chunk in chunks {
                            if tx.send(Ok(DataEvent::Data(Bytes::from_static(chunk)))).await.is_err()
                            {
                                return;
                            }
                        }
                        // Sender drops: the stream ends, triggering reconnect.
                    }
                    None => {
                        // Idle connection: keep the sender alive forever.
                        std::future::pending::<()>().await;
                    }
                }
            });
            Ok(Some(DataEventStream::new(rx)))
        })
    })
}

fn collected_events(source: &EventSource) -> Arc<Mutex<Vec<EventInfo>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    source.on_message(move |event| {
        lock_unpoisoned(&sink).push(event.clone());
    });
    events
}

#[test]
fn test_retry_delay_contract() {
    let retry_time = DEFAULT_RETRY_TIME;
    assert_eq!(calculate_retry_delay(0, retry_time), Duration::ZERO);
    assert_eq!(calculate_retry_delay(1, retry_time), retry_time);
    assert!(calculate_retry_delay(29, retry_time) > Duration::from_secs(60));
}

#[test]
fn test_retry_delay_grows_monotonically_before_clamp() {
    let retry_time = Duration::from_millis(100);
    let mut previous = Duration::ZERO;
    for attempt in 0..10 {
        let delay = calculate_retry_delay(attempt, retry_time);
        assert!(delay >= previous, "attempt {attempt}");
        previous = delay;
    }
}

#[tokio::test]
async fn test_dispatches_events_to_listeners() {
    let (header_tx, _header_rx) = mpsc::unbounded_channel();
    let factory = scripted_factory(
        vec![vec![b"event: test\nid: 123\ndata: payload\n\n".as_slice()]],
        header_tx,
    );
    let source = EventSource::new(factory);

    let all = collected_events(&source);
    let named = Arc::new(Mutex::new(Vec::new()));
    let sink = named.clone();
    source.add_event_listener("test", move |event| {
        lock_unpoisoned(&sink).push(event.clone());
    });

    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    source.close();

    let all = lock_unpoisoned(&all).clone();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].event.as_deref(), Some("test"));
    assert_eq!(all[0].data.as_deref(), Some("payload"));
    assert_eq!(lock_unpoisoned(&named).len(), 1);
}

#[tokio::test]
async fn test_retry_field_updates_retry_time() {
    let (header_tx, _header_rx) = mpsc::unbounded_channel();
    let factory = scripted_factory(vec![vec![b"retry: 123456789\n\n".as_slice()]], header_tx);
    let source = EventSource::new(factory);
    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(source.retry_time(), Duration::from_millis(123_456_789));
    source.close();
}

#[tokio::test]
async fn test_non_digit_retry_is_ignored() {
    let (header_tx, _header_rx) = mpsc::unbounded_channel();
    let factory = scripted_factory(vec![vec![b"retry: abc\n\n".as_slice()]], header_tx);
    let source = EventSource::new(factory);
    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(source.retry_time(), DEFAULT_RETRY_TIME);
    source.close();
}

#[tokio::test]
async fn test_nul_tainted_id_does_not_update_last_event_id() {
    let (header_tx, mut header_rx) = mpsc::unbounded_channel();
    let factory = scripted_factory(
        vec![
            vec![b"id: 123\ndata: first\n\nid: a\x00c\ndata: second\n\n".as_slice()],
            vec![],
        ],
        header_tx,
    );
    let source = EventSource::new(factory);
    source.connect();
    tokio::time::sleep(Duration::from_millis(250)).await;
    source.close();

    assert_eq!(source.last_event_id().as_deref(), Some("123"));

    // First connect carries no id; the reconnect resumes from the last
    // valid id.
    let first = header_rx.try_recv().unwrap();
    assert!(first.get("Last-Event-ID").is_none());
    let second = header_rx.try_recv().unwrap();
    assert_eq!(second.get("Last-Event-ID").unwrap(), "123");
}

#[tokio::test]
async fn test_double_connect_is_noop() {
    let (header_tx, mut header_rx) = mpsc::unbounded_channel();
    // Empty script: the single connection idles without ending.
    let factory = scripted_factory(vec![], header_tx);
    let source = EventSource::new(factory);

    source.connect();
    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(source.ready_state(), ReadyState::Open);
    assert!(header_rx.try_recv().is_ok());
    assert!(header_rx.try_recv().is_err(), "second connect must not dial");
    source.close();
    assert_eq!(source.ready_state(), ReadyState::Closed);
}

#[tokio::test]
async fn test_factory_returning_none_closes_with_stream_empty() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let factory: StreamFactory = Arc::new(|_| Box::pin(async { Ok(None) }));
    let source = EventSource::new(factory);
    let sink = errors.clone();
    source.on_error(move |error| {
        lock_unpoisoned(&sink).push(error.to_string());
    });

    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(source.ready_state(), ReadyState::Closed);
    let errors = lock_unpoisoned(&errors).clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no stream"), "{errors:?}");
}

#[tokio::test]
async fn test_inactivity_watchdog_fires_event_timeout() {
    let (header_tx, _header_rx) = mpsc::unbounded_channel();
    // Single idle connection that never produces events.
    let factory = scripted_factory(vec![], header_tx);
    let source = EventSource::with_inactivity_timeout(
        factory,
        Duration::from_millis(500),
        Duration::from_millis(100),
    );
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    source.on_error(move |error| {
        if let SundayError::Sse(sse) = error {
            lock_unpoisoned(&sink).push(sse.clone());
        }
    });

    source.connect();
    tokio::time::sleep(Duration::from_millis(700)).await;
    source.close();

    let errors = lock_unpoisoned(&errors).clone();
    assert_matches!(errors.first(), Some(SseError::EventTimeout));
}

#[tokio::test]
async fn test_listener_registration_is_queryable() {
    let factory: StreamFactory = Arc::new(|_| Box::pin(async { Ok(None) }));
    let source = EventSource::new(factory);

    let handler_id = source.add_event_listener("test", |_| {});
    source.add_event_listener("other", |_| {});
    let mut types = source.event_listener_types();
    types.sort();
    assert_eq!(types, vec!["other", "test"]);

    source.remove_event_listener("test", handler_id);
    assert_eq!(source.event_listener_types(), vec!["other"]);
}

#[tokio::test]
async fn test_open_listener_and_state_transitions() {
    let (header_tx, _header_rx) = mpsc::unbounded_channel();
    // Empty script: the single connection idles without ending.
    let factory = scripted_factory(vec![], header_tx);
    let source = EventSource::new(factory);

    let opened = Arc::new(AtomicUsize::new(0));
    let sink = opened.clone();
    source.on_open(move || {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(source.ready_state(), ReadyState::Closed);
    source.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.ready_state(), ReadyState::Open);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    source.close();
}
