//! Error taxonomy for the streaming pipeline
//!
//! Every failure in the crate is expressed as a [`StreamError`]. The variants
//! mirror how callers are expected to react: client errors are terminal,
//! server and rate-limit errors may be retried by the caller, timeouts and
//! cancellations are reported distinctly so UI layers can tell "the user
//! stopped it" apart from "the network failed".

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Maximum number of characters of an error body kept in an error message
pub const ERROR_BODY_LIMIT: usize = 200;

/// Errors that can occur while streaming a chat response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Streaming is not configured (missing endpoint, bad URL)
    #[error("Streaming not configured: {0}")]
    NotConfigured(String),

    /// No valid session was available to authenticate the request
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The backend rejected the request (4xx other than 429)
    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    /// The backend is rate limiting us (429)
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// The backend failed (5xx or an unexpected status)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Transport-level failure while connecting or reading the body
    #[error("Network error: {0}")]
    Network(String),

    /// A response could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend sent an `error` event in the stream
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The stream ended without content and without an `end` event
    #[error("Stream ended before any content was received")]
    EmptyStream,

    /// No terminal event arrived within the configured window
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The circuit breaker for the service is open
    #[error("Service '{service}' is temporarily unavailable (circuit open)")]
    CircuitOpen { service: String },

    /// The request was cancelled by the caller or superseded by a newer one
    #[error("Request cancelled")]
    Cancelled,
}

impl StreamError {
    /// Classify an HTTP error status into the matching variant
    ///
    /// The body is truncated to [`ERROR_BODY_LIMIT`] characters.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate_body(body);
        match status {
            429 => StreamError::RateLimited { message },
            400..=499 => StreamError::Client { status, message },
            _ => StreamError::Server { status, message },
        }
    }

    /// Whether a caller-side retry may succeed
    ///
    /// Network failures, 5xx, 429, timeouts and empty streams are transient.
    /// Everything else, including cancellation, is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Network(_)
                | StreamError::Server { .. }
                | StreamError::RateLimited { .. }
                | StreamError::Timeout(_)
                | StreamError::EmptyStream
        )
    }

    /// Whether this is an intentional cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// HTTP-equivalent status code, when one applies
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StreamError::Client { status, .. } | StreamError::Server { status, .. } => {
                Some(*status)
            }
            StreamError::RateLimited { .. } => Some(429),
            StreamError::Auth(_) => Some(401),
            StreamError::Timeout(_) => Some(408),
            StreamError::CircuitOpen { .. } => Some(503),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return StreamError::Network(format!("timed out: {err}"));
        }
        if err.is_decode() {
            return StreamError::Parse(err.to_string());
        }
        StreamError::Network(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    trimmed.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
