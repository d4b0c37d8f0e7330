//! Network session facade over the HTTP transport.
//!
//! The session owns the `reqwest` client, applies response validation
//! against the configured accepted-status set, and exposes the chunked
//! byte-stream delivery the SSE engine consumes.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use http::HeaderMap;
use http::StatusCode;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::Result;
use crate::error::SundayError;
use crate::request::HttpRequest;

/// Status codes passed through transport validation by default.
///
/// The listed 4xx codes are intentionally accepted here so the request
/// factory can decode their bodies as RFC 7807 problems instead of losing
/// them to a generic status error.
pub const DEFAULT_ACCEPTED_STATUS_CODES: [u16; 10] =
    [200, 201, 204, 205, 206, 400, 409, 410, 412, 413];

/// Session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    /// Inactivity timeout for a single read, mapped to the client's read
    /// timeout.
    pub request_timeout: Option<Duration>,
    /// Bound on the total lifetime of one request, mapped to the client's
    /// overall timeout. Leave unset for long-lived event streams.
    pub resource_timeout: Option<Duration>,
    /// Headers applied to every request.
    pub default_headers: HeaderMap,
    /// Status codes that pass response validation.
    pub accepted_status_codes: Vec<u16>,
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        SessionConfiguration {
            request_timeout: None,
            resource_timeout: None,
            default_headers: HeaderMap::new(),
            accepted_status_codes: DEFAULT_ACCEPTED_STATUS_CODES.to_vec(),
        }
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

/// One record of a chunk-delivered response.
#[derive(Debug, Clone)]
pub enum DataEvent {
    /// The response arrived; emitted exactly once, first.
    Connect(ResponseHead),
    /// One body chunk, in arrival order.
    Data(Bytes),
}

/// Lazy sequence of [`DataEvent`] records for one request.
#[derive(Debug)]
pub struct DataEventStream {
    receiver: mpsc::Receiver<Result<DataEvent>>,
}

impl DataEventStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<DataEvent>>) -> Self {
        DataEventStream { receiver }
    }
}

impl Stream for DataEventStream {
    type Item = Result<DataEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

struct SessionInner {
    client: reqwest::Client,
    configuration: SessionConfiguration,
    closed: AtomicBool,
    streams: Mutex<Vec<AbortHandle>>,
}

/// Shared handle on the underlying HTTP transport.
#[derive(Clone)]
pub struct NetworkSession {
    inner: Arc<SessionInner>,
}

impl NetworkSession {
    /// Build a session from its configuration.
    pub fn new(configuration: SessionConfiguration) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = configuration.request_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(timeout) = configuration.resource_timeout {
            builder = builder.timeout(timeout);
        }
        if !configuration.default_headers.is_empty() {
            builder = builder.default_headers(configuration.default_headers.clone());
        }
        let client = builder.build()?;
        Ok(NetworkSession {
            inner: Arc::new(SessionInner {
                client,
                configuration,
                closed: AtomicBool::new(false),
                streams: Mutex::new(Vec::new()),
            }),
        })
    }

    /// The session configuration.
    pub fn configuration(&self) -> &SessionConfiguration {
        &self.inner.configuration
    }

    /// Execute a request and return the complete validated response.
    pub async fn validated_data(&self, request: HttpRequest) -> Result<(Bytes, ResponseHead)> {
        self.ensure_open()?;
        let response = self.execute(request).await?;
        let head = ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
        };
        let data = response.bytes().await?;
        self.validate(head.status, &data)?;
        Ok((data, head))
    }

    /// Execute a request, delivering the response as one `Connect` record
    /// followed by body chunks in arrival order.
    pub async fn data_event_stream(&self, request: HttpRequest) -> Result<DataEventStream> {
        self.ensure_open()?;
        let response = self.execute(request).await?;
        let status = response.status();
        if !self.accepts(status) {
            let data = response.bytes().await.unwrap_or_default();
            return Err(SundayError::ResponseValidation { status, data });
        }

        let head = ResponseHead {
            status,
            headers: response.headers().clone(),
        };
        let (tx, rx) = mpsc::channel::<Result<DataEvent>>(16);
        let handle = tokio::spawn(async move {
            if tx.send(Ok(DataEvent::Connect(head))).await.is_err() {
                return;
            }
            let mut chunks = response.bytes_stream();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(data) => {
                        if tx.send(Ok(DataEvent::Data(data))).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(SundayError::Transport(e))).await;
                        return;
                    }
                }
            }
        });
        self.track(handle.abort_handle());
        Ok(DataEventStream::new(rx))
    }

    /// Close the session. Further requests fail with `SessionClosed`;
    /// in-flight streams are aborted when `cancel_outstanding` is set.
    pub fn close(&self, cancel_outstanding: bool) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if cancel_outstanding {
            let handles = match self.inner.streams.lock() {
                Ok(mut streams) => streams.drain(..).collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            };
            debug!(count = handles.len(), "aborting outstanding streams");
            for handle in handles {
                handle.abort();
            }
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .inner
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder.send().await.map_err(|e| {
            if let Some(status) = e.status() {
                SundayError::ResponseValidation {
                    status,
                    data: Bytes::new(),
                }
            } else if e.is_decode() {
                SundayError::InvalidHttpResponse(e.to_string())
            } else {
                SundayError::Transport(e)
            }
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SundayError::SessionClosed);
        }
        Ok(())
    }

    fn accepts(&self, status: StatusCode) -> bool {
        self.inner
            .configuration
            .accepted_status_codes
            .contains(&status.as_u16())
    }

    fn validate(&self, status: StatusCode, data: &Bytes) -> Result<()> {
        if self.accepts(status) {
            return Ok(());
        }
        Err(SundayError::ResponseValidation {
            status,
            data: data.clone(),
        })
    }

    fn track(&self, handle: AbortHandle) {
        if let Ok(mut streams) = self.inner.streams.lock() {
            streams.retain(|h| !h.is_finished());
            streams.push(handle);
        }
    }
}

impl std::fmt::Debug for NetworkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("configuration", &self.inner.configuration)
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}
