//! Incremental SSE frame parser
//!
//! Buffers raw bytes across chunks (so lines and multi-byte characters split
//! by the transport are reassembled) and emits one [`SseFrame`] per dispatched
//! event.

use std::mem;

use bytes::Bytes;
use memchr::memchr;

/// One frame as it appeared on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// Concatenated `data:` lines, joined with `\n`
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseFrame {
    /// A synthesized `event: token` frame
    pub fn token(data: impl Into<String>) -> Self {
        SseFrame {
            event: Some("token".to_string()),
            data: data.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct PendingFrame {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl PendingFrame {
    /// Take the frame if it carries an event name or at least one data line
    fn take(&mut self) -> Option<SseFrame> {
        let pending = mem::take(self);
        if pending.event.is_none() && pending.data.is_none() {
            return None;
        }
        Some(SseFrame {
            event: pending.event,
            data: pending.data.unwrap_or_default(),
            id: pending.id,
            retry: pending.retry,
        })
    }
}

/// SSE line buffer and frame splitter
pub struct SseParser {
    buffer: Vec<u8>,
    pending: PendingFrame,
    coerce_bare_lines: bool,
}

impl SseParser {
    /// Create a parser
    ///
    /// With `coerce_bare_lines`, lines that carry no SSE field structure are
    /// emitted as their own `token` frames instead of being ignored.
    pub fn new(coerce_bare_lines: bool) -> Self {
        Self {
            buffer: Vec::new(),
            pending: PendingFrame::default(),
            coerce_bare_lines,
        }
    }

    /// Parse a chunk of bytes and return every frame it completes
    ///
    /// Incomplete trailing lines stay buffered until the next call.
    pub fn parse_chunk(&mut self, bytes: &Bytes) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + pos;
            let raw = &self.buffer[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            start = end + 1;
            self.process_line(&line, &mut frames);
        }
        self.buffer.drain(..start);

        frames
    }

    /// Flush whatever remains once the body has ended
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = mem::take(&mut self.buffer);
            let rest = rest.strip_suffix(b"\r").unwrap_or(rest.as_slice());
            let line = String::from_utf8_lossy(rest).into_owned();
            self.process_line(&line, &mut frames);
        }
        if let Some(frame) = self.pending.take() {
            frames.push(frame);
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        // Blank line dispatches the pending frame
        if line.is_empty() {
            if let Some(frame) = self.pending.take() {
                frames.push(frame);
            }
            return;
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => match self.pending.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            "id" => self.pending.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse() {
                    self.pending.retry = Some(ms);
                }
            }
            _ if self.coerce_bare_lines => {
                if let Some(frame) = self.pending.take() {
                    frames.push(frame);
                }
                frames.push(SseFrame::token(line));
            }
            _ => log::debug!("Ignoring line without SSE field: {line:?}"),
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod parser_tests;
