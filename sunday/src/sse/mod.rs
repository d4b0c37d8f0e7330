//! Server-sent events engine.
//!
//! Layered as a pure [`parser::EventParser`] turning byte chunks into event
//! records, an [`event_source::EventSource`] state machine adding
//! connect/reconnect, backoff, last-event-id resumption and the inactivity
//! watchdog, and a [`typed::TypedEventStream`] projecting named events
//! through registered decoders.

pub mod event_source;
pub mod parser;
pub mod typed;
