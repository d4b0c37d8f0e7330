//! Pure incremental parser for the `text/event-stream` wire format.
//!
//! The parser consumes byte chunks and yields complete event records. It
//! performs no I/O and holds no timers; the event source drives it and owns
//! reconnection policy. Lines terminate with `\n`, `\r` or `\r\n`,
//! interchangeably and across chunk boundaries.

use tracing::trace;
use tracing::warn;

/// One dispatched event record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventInfo {
    /// Event name from the `event` field.
    pub event: Option<String>,
    /// Event id from the `id` field. Absent when the stream carried an id
    /// containing a NUL byte, which invalidates the assignment.
    pub id: Option<String>,
    /// Raw `retry` field value; only digits-only values are honored when
    /// applied.
    pub retry: Option<String>,
    /// Concatenated `data` payload, joined with `\n`.
    pub data: Option<String>,
}

/// Result of feeding one chunk to the parser.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedChunk {
    /// Events dispatched by empty lines within the chunk.
    pub events: Vec<EventInfo>,
    /// Number of comment lines seen; comments act as server pings.
    pub comments: usize,
}

/// Incremental event-stream parser.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: Vec<u8>,
    event: Option<String>,
    id: Option<String>,
    retry: Option<String>,
    data: Option<String>,
}

impl EventParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning the events it completed.
    pub fn process(&mut self, chunk: &[u8]) -> ParsedChunk {
        self.buffer.extend_from_slice(chunk);

        let mut parsed = ParsedChunk::default();
        while let Some((end, terminator_len)) = find_line_end(&self.buffer) {
            let line_bytes: Vec<u8> = self.buffer.drain(..end + terminator_len).collect();
            let line = String::from_utf8_lossy(&line_bytes[..end]).into_owned();
            self.process_line(&line, &mut parsed);
        }
        parsed
    }

    fn process_line(&mut self, line: &str, parsed: &mut ParsedChunk) {
        if line.is_empty() {
            if let Some(event) = self.take_event() {
                parsed.events.push(event);
            }
            return;
        }

        if line.starts_with(':') {
            trace!("comment line");
            parsed.comments += 1;
            return;
        }

        let (field, value) = match line.find(':') {
            Some(position) => {
                let value = &line[position + 1..];
                (&line[..position], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if value.contains('\0') {
                    warn!("ignoring event id containing a NUL byte");
                } else {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => self.retry = Some(value.to_string()),
            "data" => {
                let data = self.data.get_or_insert_with(String::new);
                data.push_str(value);
                data.push('\n');
            }
            other => trace!(field = other, "ignoring unknown field"),
        }
    }

    /// Dispatch the accumulated event, if any field was set.
    fn take_event(&mut self) -> Option<EventInfo> {
        if self.event.is_none() && self.id.is_none() && self.retry.is_none() && self.data.is_none()
        {
            return None;
        }
        let mut data = self.data.take();
        if let Some(text) = &mut data
            && text.ends_with('\n')
        {
            text.pop();
        }
        Some(EventInfo {
            event: self.event.take(),
            id: self.id.take(),
            retry: self.retry.take(),
            data,
        })
    }
}

/// Locate the next complete line: `(content_end, terminator_len)`.
///
/// A lone `\r` as the final buffered byte is not a complete line yet; the
/// terminator may continue with `\n` in the next chunk.
fn find_line_end(buffer: &[u8]) -> Option<(usize, usize)> {
    for (i, &byte) in buffer.iter().enumerate() {
        if byte == b'\n' {
            return Some((i, 1));
        }
        if byte == b'\r' {
            return match buffer.get(i + 1) {
                Some(b'\n') => Some((i, 2)),
                Some(_) => Some((i, 1)),
                None => None,
            };
        }
    }
    None
}

#[cfg(test)]
#[path = "parser.test.rs"]
mod tests;
