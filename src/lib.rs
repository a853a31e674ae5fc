//! Streaming client for a medical chat assistant
//!
//! Consumes Server-Sent Events from a chat backend, dispatches typed events
//! to a [`StreamHandler`], and provides the pieces around the stream: a
//! connection registry that keeps one request per question in flight, safety
//! buffering of critical medical content, debounced token output, retry with
//! backoff and a per-service circuit breaker.

pub mod auth;
pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod handler;
pub mod metrics;
pub mod registry;
pub mod resilience;
pub mod service;
pub mod sse;

#[cfg(test)]
mod test_utils;

pub use client::{Completion, SseClient, SseRequest, StreamState, StreamSummary};
pub use error::{ConfigError, StreamError};
pub use filter::MedicalStreamingFilter;
pub use handler::{ChannelHandler, FilteredHandler, StreamHandler, StreamUpdate};
pub use registry::{ConnectionGuard, ConnectionKey, ConnectionRegistry};
pub use service::{ChatPayload, StreamOptions, StreamingService};
