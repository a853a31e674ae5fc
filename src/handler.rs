//! Outbound callback API
//!
//! The client reports progress through a [`StreamHandler`]. Completion and
//! error callbacks fire at most once per request, after every token, source
//! and metadata callback for that request.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::StreamError;
use crate::filter::MedicalStreamingFilter;

/// Receiver of stream progress
pub trait StreamHandler: Send {
    /// The backend accepted the request and content is about to flow
    fn on_start(&mut self) {}

    /// One incremental text fragment
    fn on_token(&mut self, token: &str);

    /// Cited source documents (never called with an empty slice)
    fn on_source(&mut self, _sources: &[Value]) {}

    /// Session or run metadata sent by the backend
    fn on_metadata(&mut self, _metadata: &Value) {}

    /// The answer is complete
    fn on_complete(&mut self);

    /// The request failed (never called for cancellation)
    fn on_error(&mut self, error: &StreamError);
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn on_token(&mut self, token: &str) {
        (**self).on_token(token)
    }

    fn on_source(&mut self, sources: &[Value]) {
        (**self).on_source(sources)
    }

    fn on_metadata(&mut self, metadata: &Value) {
        (**self).on_metadata(metadata)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_error(&mut self, error: &StreamError) {
        (**self).on_error(error)
    }
}

/// Stream progress as a message, for consumers on another task
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Started,
    Token(String),
    Sources(Vec<Value>),
    Metadata(Value),
    Complete,
    Error(StreamError),
}

/// Forwards every callback as a [`StreamUpdate`] over an unbounded channel
///
/// A closed receiver is not an error: the consumer has gone away and further
/// updates are dropped.
pub struct ChannelHandler {
    tx: UnboundedSender<StreamUpdate>,
}

impl ChannelHandler {
    pub fn new(tx: UnboundedSender<StreamUpdate>) -> Self {
        Self { tx }
    }

    fn send(&self, update: StreamUpdate) {
        if self.tx.send(update).is_err() {
            log::debug!("Stream update receiver dropped");
        }
    }
}

impl StreamHandler for ChannelHandler {
    fn on_start(&mut self) {
        self.send(StreamUpdate::Started);
    }

    fn on_token(&mut self, token: &str) {
        self.send(StreamUpdate::Token(token.to_string()));
    }

    fn on_source(&mut self, sources: &[Value]) {
        self.send(StreamUpdate::Sources(sources.to_vec()));
    }

    fn on_metadata(&mut self, metadata: &Value) {
        self.send(StreamUpdate::Metadata(metadata.clone()));
    }

    fn on_complete(&mut self) {
        self.send(StreamUpdate::Complete);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.send(StreamUpdate::Error(error.clone()));
    }
}

/// Routes tokens through a [`MedicalStreamingFilter`] before `inner` sees them
///
/// Held-back content is flushed before completion and before an error is
/// reported, so nothing is silently dropped.
pub struct FilteredHandler<H> {
    inner: H,
    filter: MedicalStreamingFilter,
}

impl<H: StreamHandler> FilteredHandler<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            filter: MedicalStreamingFilter::new(),
        }
    }

    pub fn filter(&self) -> &MedicalStreamingFilter {
        &self.filter
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    fn flush_into_inner(&mut self) {
        if let Some(rest) = self.filter.flush() {
            self.inner.on_token(&rest);
        }
    }
}

impl<H: StreamHandler> StreamHandler for FilteredHandler<H> {
    fn on_start(&mut self) {
        self.inner.on_start();
    }

    fn on_token(&mut self, token: &str) {
        if let Some(released) = self.filter.add_token(token) {
            self.inner.on_token(&released);
        }
    }

    fn on_source(&mut self, sources: &[Value]) {
        self.inner.on_source(sources);
    }

    fn on_metadata(&mut self, metadata: &Value) {
        self.inner.on_metadata(metadata);
    }

    fn on_complete(&mut self) {
        self.flush_into_inner();
        self.inner.on_complete();
    }

    fn on_error(&mut self, error: &StreamError) {
        self.flush_into_inner();
        self.inner.on_error(error);
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod handler_tests;
