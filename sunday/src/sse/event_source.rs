//! Server-sent events consumer with automatic reconnection.
//!
//! An [`EventSource`] owns a background task that opens the byte stream via
//! an injected request closure, feeds the [`EventParser`], dispatches events
//! to registered listeners, and reconnects with exponential backoff. The
//! last received event id is resent as the `Last-Event-ID` header on every
//! reconnect, and an optional inactivity watchdog forces a reconnect cycle
//! when the server goes quiet (comment lines count as activity).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::warn;

use crate::error::Result;
use crate::error::SseError;
use crate::error::SundayError;
use crate::session::DataEvent;
use crate::session::DataEventStream;
use crate::sse::parser::EventInfo;
use crate::sse::parser::EventParser;

/// Default base reconnect delay, overridable by the stream's `retry` field.
pub const DEFAULT_RETRY_TIME: Duration = Duration::from_millis(100);

/// Exponent clamp for the reconnect backoff.
const MAX_RETRY_EXPONENT: u32 = 24;

const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Connection state of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Not connected and not reconnecting.
    Closed,
    /// Opening the stream or waiting out a reconnect delay.
    Connecting,
    /// Receiving events.
    Open,
}

/// Closure that opens one byte stream per (re)connect attempt.
///
/// Receives the headers the source requires on this attempt (currently only
/// `Last-Event-ID`). Returning `Ok(None)` closes the source permanently with
/// [`SseError::RequestStreamEmpty`].
pub type StreamFactory =
    Arc<dyn Fn(HeaderMap) -> BoxFuture<'static, Result<Option<DataEventStream>>> + Send + Sync>;

type OpenHandler = Box<dyn FnMut() + Send>;
type MessageHandler = Box<dyn FnMut(&EventInfo) + Send>;
type ErrorHandler = Box<dyn FnMut(&SundayError) + Send>;

#[derive(Default)]
struct Listeners {
    on_open: Option<OpenHandler>,
    on_message: Option<MessageHandler>,
    on_error: Option<ErrorHandler>,
    event: HashMap<String, HashMap<u64, MessageHandler>>,
    next_handler_id: u64,
}

#[derive(Debug, Clone, Copy)]
struct InactivityTimeout {
    interval: Duration,
    check_interval: Duration,
}

struct Shared {
    stream_factory: StreamFactory,
    state: Mutex<ReadyState>,
    retry_time_ms: AtomicU64,
    last_event_id: Mutex<Option<String>>,
    last_event_time: Mutex<Instant>,
    timeout: Option<InactivityTimeout>,
    listeners: Mutex<Listeners>,
}

/// W3C-style `EventSource` over the session's data event streams.
pub struct EventSource {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventSource {
    /// Create a source without an inactivity watchdog.
    pub fn new(stream_factory: StreamFactory) -> Self {
        Self::build(stream_factory, None)
    }

    /// Create a source whose watchdog forces a reconnect when no event or
    /// comment arrives for `timeout_interval`, checked every
    /// `check_interval`.
    pub fn with_inactivity_timeout(
        stream_factory: StreamFactory,
        timeout_interval: Duration,
        check_interval: Duration,
    ) -> Self {
        Self::build(
            stream_factory,
            Some(InactivityTimeout {
                interval: timeout_interval,
                check_interval,
            }),
        )
    }

    fn build(stream_factory: StreamFactory, timeout: Option<InactivityTimeout>) -> Self {
        EventSource {
            shared: Arc::new(Shared {
                stream_factory,
                state: Mutex::new(ReadyState::Closed),
                retry_time_ms: AtomicU64::new(DEFAULT_RETRY_TIME.as_millis() as u64),
                last_event_id: Mutex::new(None),
                last_event_time: Mutex::new(Instant::now()),
                timeout,
                listeners: Mutex::new(Listeners::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Current base reconnect delay.
    pub fn retry_time(&self) -> Duration {
        Duration::from_millis(self.shared.retry_time_ms.load(Ordering::SeqCst))
    }

    /// Id of the most recent event that carried a valid `id` field.
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.lock_last_event_id().clone()
    }

    /// Set the single `onOpen` callback.
    pub fn on_open(&self, handler: impl FnMut() + Send + 'static) {
        self.shared.lock_listeners().on_open = Some(Box::new(handler));
    }

    /// Set the single `onMessage` callback, invoked for every event.
    pub fn on_message(&self, handler: impl FnMut(&EventInfo) + Send + 'static) {
        self.shared.lock_listeners().on_message = Some(Box::new(handler));
    }

    /// Set the single `onError` callback.
    pub fn on_error(&self, handler: impl FnMut(&SundayError) + Send + 'static) {
        self.shared.lock_listeners().on_error = Some(Box::new(handler));
    }

    /// Register a listener for a named event type, returning its handle.
    pub fn add_event_listener(
        &self,
        event_type: &str,
        handler: impl FnMut(&EventInfo) + Send + 'static,
    ) -> u64 {
        let mut listeners = self.shared.lock_listeners();
        listeners.next_handler_id += 1;
        let handler_id = listeners.next_handler_id;
        listeners
            .event
            .entry(event_type.to_string())
            .or_default()
            .insert(handler_id, Box::new(handler));
        handler_id
    }

    /// Remove a previously registered listener.
    pub fn remove_event_listener(&self, event_type: &str, handler_id: u64) {
        let mut listeners = self.shared.lock_listeners();
        if let Some(handlers) = listeners.event.get_mut(event_type) {
            handlers.remove(&handler_id);
            if handlers.is_empty() {
                listeners.event.remove(event_type);
            }
        }
    }

    /// Event types with at least one registered listener.
    pub fn event_listener_types(&self) -> Vec<String> {
        self.shared.lock_listeners().event.keys().cloned().collect()
    }

    /// Start the connect loop. A connect while not closed is a no-op.
    pub fn connect(&self) {
        let mut task = lock_unpoisoned(&self.task);
        if self.shared.state() != ReadyState::Closed {
            return;
        }
        self.shared.set_state(ReadyState::Connecting);
        let shared = self.shared.clone();
        *task = Some(tokio::spawn(run(shared)));
    }

    /// Stop the source. Idempotent and final for the current task; the
    /// stream, parser state and timers are dropped.
    pub fn close(&self) {
        self.shared.set_state(ReadyState::Closed);
        if let Some(task) = lock_unpoisoned(&self.task).take() {
            task.abort();
        }
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("state", &self.shared.state())
            .field("retry_time", &self.shared.retry_time())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn state(&self) -> ReadyState {
        *lock_unpoisoned(&self.state)
    }

    fn set_state(&self, state: ReadyState) {
        *lock_unpoisoned(&self.state) = state;
    }

    fn retry_time(&self) -> Duration {
        Duration::from_millis(self.retry_time_ms.load(Ordering::SeqCst))
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        lock_unpoisoned(&self.listeners)
    }

    fn lock_last_event_id(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        lock_unpoisoned(&self.last_event_id)
    }

    /// Record event/comment activity for the inactivity watchdog.
    fn touch(&self) {
        *lock_unpoisoned(&self.last_event_time) = Instant::now();
    }

    fn inactive_for(&self) -> Duration {
        lock_unpoisoned(&self.last_event_time).elapsed()
    }

    fn connect_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(id) = self.lock_last_event_id().as_deref() {
            match HeaderValue::from_str(id) {
                Ok(value) => {
                    headers.insert(LAST_EVENT_ID, value);
                }
                Err(_) => {
                    self.notify_error(&SundayError::Sse(SseError::InvalidLastEventId));
                }
            }
        }
        headers
    }

    fn notify_open(&self) {
        if let Some(on_open) = &mut self.lock_listeners().on_open {
            on_open();
        }
    }

    fn notify_error(&self, error: &SundayError) {
        if let Some(on_error) = &mut self.lock_listeners().on_error {
            on_error(error);
        }
    }

    /// Apply an event's side effects and invoke listeners.
    fn dispatch(&self, event: EventInfo) {
        self.touch();

        if let Some(id) = &event.id {
            *self.lock_last_event_id() = Some(id.clone());
        }

        if let Some(retry) = &event.retry {
            if !retry.is_empty() && retry.bytes().all(|b| b.is_ascii_digit()) {
                match retry.parse::<u64>() {
                    Ok(millis) => {
                        debug!(millis, "updating retry time");
                        self.retry_time_ms.store(millis, Ordering::SeqCst);
                    }
                    Err(_) => warn!(retry = %retry, "ignoring out-of-range retry value"),
                }
            } else {
                debug!(retry = %retry, "ignoring non-numeric retry value");
            }
        }

        let mut listeners = self.lock_listeners();
        if let Some(on_message) = &mut listeners.on_message {
            on_message(&event);
        }
        let event_type = event.event.as_deref().unwrap_or("message");
        if let Some(handlers) = listeners.event.get_mut(event_type) {
            for handler in handlers.values_mut() {
                handler(&event);
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Reconnect delay for the given attempt.
///
/// The first connect is immediate, the first retry waits exactly the base
/// retry time, and later retries grow exponentially (exponent clamped) with
/// full jitter of up to one base interval added.
pub(crate) fn calculate_retry_delay(attempt: u32, retry_time: Duration) -> Duration {
    match attempt {
        0 => Duration::ZERO,
        1 => retry_time,
        _ => {
            let exponent = (attempt - 1).min(MAX_RETRY_EXPONENT);
            let backoff = retry_time.saturating_mul(1u32 << exponent);
            let jitter = retry_time.mul_f64(rand::random::<f64>());
            backoff.saturating_add(jitter)
        }
    }
}

/// Connect loop: runs until the source is closed or the stream factory
/// declines to produce a stream.
async fn run(shared: Arc<Shared>) {
    let mut attempt: u32 = 0;
    loop {
        if shared.state() == ReadyState::Closed {
            return;
        }

        let delay = calculate_retry_delay(attempt, shared.retry_time());
        if !delay.is_zero() {
            debug!(?delay, attempt, "delaying reconnect");
            tokio::time::sleep(delay).await;
        }

        shared.set_state(ReadyState::Connecting);
        let headers = shared.connect_headers();
        match (shared.stream_factory)(headers).await {
            Err(error) => {
                debug!(%error, "connect failed");
                shared.notify_error(&error);
                attempt += 1;
            }
            Ok(None) => {
                shared.notify_error(&SundayError::Sse(SseError::RequestStreamEmpty));
                shared.set_state(ReadyState::Closed);
                return;
            }
            Ok(Some(stream)) => {
                let opened = consume(&shared, stream).await;
                // A connection that opened resets the backoff schedule.
                attempt = if opened { 1 } else { attempt + 1 };
            }
        }
    }
}

/// Consume one stream until it errors, ends, or trips the watchdog.
/// Returns whether the stream reached the open state.
async fn consume(shared: &Arc<Shared>, mut stream: DataEventStream) -> bool {
    let mut parser = EventParser::new();
    let mut opened = false;

    let check_period = shared
        .timeout
        .map(|t| t.check_interval)
        .unwrap_or(Duration::from_secs(3600));
    let mut check_timer = tokio::time::interval(check_period);
    check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    check_timer.tick().await;

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(DataEvent::Connect(_))) => {
                    debug!("event source opened");
                    opened = true;
                    shared.touch();
                    shared.set_state(ReadyState::Open);
                    shared.notify_open();
                }
                Some(Ok(DataEvent::Data(chunk))) => {
                    let parsed = parser.process(&chunk);
                    if parsed.comments > 0 {
                        shared.touch();
                    }
                    for event in parsed.events {
                        shared.dispatch(event);
                    }
                }
                Some(Err(error)) => {
                    debug!(%error, "stream failed");
                    shared.notify_error(&error);
                    shared.set_state(ReadyState::Connecting);
                    return opened;
                }
                None => {
                    debug!("stream ended");
                    shared.set_state(ReadyState::Connecting);
                    return opened;
                }
            },
            _ = check_timer.tick() => {
                if let Some(timeout) = shared.timeout
                    && shared.inactive_for() >= timeout.interval
                {
                    warn!("event inactivity timeout");
                    shared.notify_error(&SundayError::Sse(SseError::EventTimeout));
                    shared.set_state(ReadyState::Connecting);
                    return opened;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "event_source.test.rs"]
mod tests;
