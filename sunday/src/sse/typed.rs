//! Typed projection of named SSE events.
//!
//! An [`EventDecoders`] map routes named events through registered decoders;
//! [`TypedEventStream`] surfaces the decoded values as a `Stream`. Events
//! with unregistered names are dropped silently, decode failures become
//! stream errors, and dropping the stream closes the underlying source.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::error::ResponseDecodingError;
use crate::error::Result;
use crate::media_type::MediaType;
use crate::sse::event_source::EventSource;
use crate::sse::parser::EventInfo;

type DecodeFn<T> = Arc<dyn Fn(&EventInfo) -> Result<T> + Send + Sync>;

/// Map from event name to the decoder producing the stream's value type.
pub struct EventDecoders<T> {
    decoders: HashMap<String, DecodeFn<T>>,
}

impl<T> Default for EventDecoders<T> {
    fn default() -> Self {
        EventDecoders {
            decoders: HashMap::new(),
        }
    }
}

impl<T> EventDecoders<T> {
    /// Create an empty decoder map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a JSON decoder for an event name.
    pub fn json(self, event_type: &str) -> Self
    where
        T: DeserializeOwned,
    {
        self.register(event_type, |event: &EventInfo| {
            let data = event
                .data
                .as_deref()
                .ok_or(ResponseDecodingError::NoData)?;
            serde_json::from_str(data).map_err(|e| {
                ResponseDecodingError::DeserializationFailed {
                    content_type: MediaType::json(),
                    source: Box::new(e),
                }
                .into()
            })
        })
    }

    /// Register a custom decoder for an event name.
    pub fn register(
        mut self,
        event_type: &str,
        decode: impl Fn(&EventInfo) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.decoders
            .insert(event_type.to_string(), Arc::new(decode));
        self
    }

    /// Registered event names.
    pub fn event_types(&self) -> Vec<String> {
        self.decoders.keys().cloned().collect()
    }
}

/// Stream of typed values projected from an event source.
pub struct TypedEventStream<T> {
    source: EventSource,
    receiver: mpsc::UnboundedReceiver<Result<T>>,
}

impl<T: Send + 'static> TypedEventStream<T> {
    /// Wire the decoders onto the source's listeners and connect it.
    pub fn new(source: EventSource, decoders: EventDecoders<T>) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        for (event_type, decode) in decoders.decoders {
            let tx = tx.clone();
            source.add_event_listener(&event_type, move |event| {
                let _ = tx.send(decode(event));
            });
        }
        source.connect();
        TypedEventStream { source, receiver }
    }

    /// The wrapped event source.
    pub fn event_source(&self) -> &EventSource {
        &self.source
    }

    /// Stop the stream and the underlying source.
    pub fn close(&self) {
        self.source.close();
    }
}

impl<T> Stream for TypedEventStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
#[path = "typed.test.rs"]
mod tests;
