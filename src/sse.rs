//! Server-Sent Events ingestion
//!
//! `parser` turns raw body bytes into [`SseFrame`]s, `event` classifies a frame
//! into a typed [`StreamEvent`], and `response` interprets the JSON bodies
//! returned by backends that answer without streaming.

mod event;
mod parser;
mod response;

pub use event::{StreamEvent, decode_token};
pub use parser::{SseFrame, SseParser};
pub use response::{FallbackAnswer, ResponseShape, full_answer};

/// Sentinel some backends send as the last untyped frame
pub const DONE_SENTINEL: &str = "[DONE]";
