//! Typed stream events
//!
//! Frame classification follows the backend's event vocabulary:
//!
//! | event             | payload                         | result                         |
//! |-------------------|---------------------------------|--------------------------------|
//! | `start`           | JSON                            | [`StreamEvent::Start`]         |
//! | `token`           | text, possibly JSON-string-encoded | [`StreamEvent::Token`]      |
//! | `sourceDocuments` | JSON array                      | [`StreamEvent::SourceDocuments`] (non-empty only) |
//! | `metadata`        | JSON object                     | [`StreamEvent::Metadata`]      |
//! | `end`             | ignored                         | [`StreamEvent::End`]           |
//! | `error`           | message                         | [`StreamEvent::Error`]         |
//! | none / `message`  | anything                        | [`StreamEvent::Message`]       |
//! | anything else     | ignored                         | [`StreamEvent::Ignored`]       |
//!
//! Frames whose JSON payload fails to parse are logged and skipped.

use serde_json::Value;

use super::parser::SseFrame;

/// One classified event from the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start(Value),
    Token(String),
    SourceDocuments(Vec<Value>),
    Metadata(Value),
    End,
    Error(String),
    /// Untyped frame, carrying the raw payload
    Message(String),
    /// Named event this client does not handle
    Ignored(String),
}

impl StreamEvent {
    /// Classify a frame
    ///
    /// Returns None for frames that carry nothing to deliver: empty tokens,
    /// empty source lists and unparseable JSON payloads.
    pub fn from_frame(frame: SseFrame) -> Option<Self> {
        let SseFrame { event, data, .. } = frame;
        match event.as_deref().unwrap_or("message") {
            "start" => parse_json(&data, "start").map(StreamEvent::Start),
            "token" => decode_token(&data).map(StreamEvent::Token),
            "sourceDocuments" => match parse_json(&data, "sourceDocuments")? {
                Value::Array(docs) if docs.is_empty() => None,
                Value::Array(docs) => Some(StreamEvent::SourceDocuments(docs)),
                other => {
                    log::warn!("sourceDocuments payload is not an array: {other}");
                    None
                }
            },
            "metadata" => match parse_json(&data, "metadata")? {
                metadata @ Value::Object(_) => Some(StreamEvent::Metadata(metadata)),
                other => {
                    log::warn!("metadata payload is not an object: {other}");
                    None
                }
            },
            "end" => Some(StreamEvent::End),
            "error" => Some(StreamEvent::Error(data)),
            "message" | "" => Some(StreamEvent::Message(data)),
            other => Some(StreamEvent::Ignored(other.to_string())),
        }
    }
}

/// Decode a token payload
///
/// Backends JSON-encode tokens to carry newlines through the transport; a
/// payload that is a valid JSON string literal is decoded, anything else is
/// used as-is. Empty and `"undefined"` tokens are dropped. Whitespace-only
/// tokens are kept: newlines matter to markdown rendering downstream.
pub fn decode_token(raw: &str) -> Option<String> {
    let token = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    };

    if token.is_empty() || token == "undefined" {
        return None;
    }
    Some(token)
}

fn parse_json(data: &str, event: &str) -> Option<Value> {
    if data.trim().is_empty() {
        log::debug!("Skipping empty {event} frame");
        return None;
    }
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Skipping {event} frame with malformed JSON: {e}");
            None
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod event_tests;
