//! SSE client
//!
//! Performs one HTTP request, checks the status and content type, and either
//! consumes the `text/event-stream` body frame by frame or interprets a plain
//! JSON answer. Every await point races the caller's cancellation token.

mod session;

pub use session::{Completion, StreamState, StreamSummary};

use std::pin::pin;

use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::handler::StreamHandler;
use crate::sse::{FallbackAnswer, SseParser};
use session::{Flow, StreamSession};

/// Media type that selects the streaming path
pub const EVENT_STREAM: &str = "text/event-stream";

/// A prepared SSE request
#[derive(Debug, Clone)]
pub struct SseRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl SseRequest {
    /// POST with a JSON body
    pub fn post_json(url: Url, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            url,
            method: Method::POST,
            headers,
            body: Some(body),
        }
    }

    /// Attach a bearer token
    pub fn bearer(self, token: &str) -> Result<Self, StreamError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| StreamError::Auth("access token is not a valid header value".into()))?;
        value.set_sensitive(true);
        Ok(self.with_header(AUTHORIZATION, value))
    }

    pub fn header(self, name: &str, value: &str) -> Result<Self, StreamError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StreamError::NotConfigured(format!("invalid header name: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StreamError::NotConfigured(format!("invalid header value: {e}")))?;
        Ok(self.with_header(name, value))
    }

    fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Streams one request into a [`StreamHandler`]
#[derive(Debug, Clone)]
pub struct SseClient {
    http: reqwest::Client,
    coerce_bare_lines: bool,
}

impl Default for SseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SseClient {
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    /// Reuse an existing connection pool
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            coerce_bare_lines: true,
        }
    }

    /// Treat lines without a recognized field as token frames
    pub fn coerce_bare_lines(mut self, enabled: bool) -> Self {
        self.coerce_bare_lines = enabled;
        self
    }

    /// Perform the request and deliver its content to `handler`
    ///
    /// On failure `on_error` has already been called exactly once, except for
    /// [`StreamError::Cancelled`], which never reaches the handler.
    ///
    /// # Arguments
    /// * `request` - URL, method, headers and body to send
    /// * `handler` - Receiver of tokens, sources, metadata and the terminal callback
    /// * `cancel` - Aborts the request at the next await point when triggered
    ///
    /// # Returns
    /// Metrics and the completion path on success
    pub async fn fetch_sse<H: StreamHandler + ?Sized>(
        &self,
        request: &SseRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, StreamError> {
        let mut session = StreamSession::new(handler);
        match self.run(request, &mut session, cancel).await {
            Ok(()) => Ok(session.into_summary()),
            Err(StreamError::Cancelled) => {
                log::debug!("Stream to {} cancelled", request.url);
                session.cancel();
                Err(StreamError::Cancelled)
            }
            Err(err) => {
                log::debug!("Stream to {} failed: {}", request.url, err);
                session.fail(&err);
                Err(err)
            }
        }
    }

    async fn run<H: StreamHandler + ?Sized>(
        &self,
        request: &SseRequest,
        session: &mut StreamSession<'_, H>,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        log::debug!("Opening stream: {} {}", request.method, request.url);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            result = builder.send() => result?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            return Err(StreamError::from_status(status.as_u16(), &body));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !content_type.starts_with(EVENT_STREAM) {
            log::debug!("Non-streaming response ({content_type}); reading JSON answer");
            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                text = response.text() => text?,
            };
            session.begin();
            session.record_bytes(text.len());
            let body: Value = serde_json::from_str(&text)
                .map_err(|e| StreamError::Parse(format!("invalid JSON response: {e}")))?;
            let answer = FallbackAnswer::from_body(&body)
                .ok_or_else(|| StreamError::Parse("unrecognized response format".into()))?;
            session.deliver_answer(answer);
            session.complete(Completion::Fallback);
            return Ok(());
        }

        session.begin();
        let mut parser = SseParser::new(self.coerce_bare_lines);
        let mut body = pin!(response.bytes_stream());

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk.map_err(|e| StreamError::Network(e.to_string()))?;
            session.record_bytes(chunk.len());

            for frame in parser.parse_chunk(&chunk) {
                if session.dispatch(frame)? == Flow::Stop {
                    return Ok(());
                }
            }
        }

        for frame in parser.finish() {
            if session.dispatch(frame)? == Flow::Stop {
                return Ok(());
            }
        }
        session.finish_stream()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
