//! Per-request dispatch state
//!
//! A [`StreamSession`] owns the lifecycle of one request: it applies each
//! classified event to the handler and guards the terminal callbacks so that
//! `on_complete`/`on_error` fire at most once.

use serde_json::Value;

use crate::error::StreamError;
use crate::handler::StreamHandler;
use crate::metrics::StreamMetrics;
use crate::sse::{DONE_SENTINEL, FallbackAnswer, SseFrame, StreamEvent, full_answer};

/// Lifecycle of one streaming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl StreamState {
    /// Legal transitions: `Idle -> Streaming`, and from `Idle` or `Streaming`
    /// into any terminal state except `Idle -> Completed`
    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, next),
            (Idle, Streaming)
                | (Idle, Errored)
                | (Idle, Cancelled)
                | (Streaming, Completed)
                | (Streaming, Errored)
                | (Streaming, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Errored | StreamState::Cancelled
        )
    }
}

/// How a successful stream reached completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The backend sent an `end` event
    EndEvent,
    /// The body ended after content without an `end` event
    Synthesized,
    /// The backend answered with plain JSON
    Fallback,
    /// An untyped frame carried the complete answer
    FullMessage,
}

/// Outcome of a successful request
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub metrics: StreamMetrics,
    pub completion: Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) struct StreamSession<'h, H: StreamHandler + ?Sized> {
    handler: &'h mut H,
    state: StreamState,
    metrics: StreamMetrics,
    completion: Option<Completion>,
}

impl<'h, H: StreamHandler + ?Sized> StreamSession<'h, H> {
    pub(crate) fn new(handler: &'h mut H) -> Self {
        Self {
            handler,
            state: StreamState::Idle,
            metrics: StreamMetrics::start(),
            completion: None,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    fn transition(&mut self, next: StreamState) -> bool {
        if !self.state.can_transition_to(next) {
            log::debug!("Ignoring stream transition {:?} -> {:?}", self.state, next);
            return false;
        }
        log::debug!("Stream state {:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }

    /// Response accepted; content is about to flow
    pub(crate) fn begin(&mut self) {
        if self.transition(StreamState::Streaming) {
            self.handler.on_start();
        }
    }

    pub(crate) fn record_bytes(&mut self, len: usize) {
        self.metrics.record_bytes(len);
    }

    /// Apply one wire frame
    pub(crate) fn dispatch(&mut self, frame: SseFrame) -> Result<Flow, StreamError> {
        if self.state.is_terminal() {
            return Ok(Flow::Stop);
        }
        self.metrics.record_frame();

        let Some(event) = StreamEvent::from_frame(frame) else {
            return Ok(Flow::Continue);
        };

        match event {
            StreamEvent::Start(metadata) | StreamEvent::Metadata(metadata) => {
                self.handler.on_metadata(&metadata)
            }
            StreamEvent::Token(token) => self.token(&token),
            StreamEvent::SourceDocuments(docs) => self.handler.on_source(&docs),
            StreamEvent::End => {
                self.complete(Completion::EndEvent);
                return Ok(Flow::Stop);
            }
            StreamEvent::Error(message) => return Err(StreamError::Upstream(message)),
            StreamEvent::Message(raw) => return Ok(self.message(raw)),
            StreamEvent::Ignored(name) => log::debug!("Ignoring '{name}' event"),
        }
        Ok(Flow::Continue)
    }

    /// Untyped frame: a complete answer, the done sentinel, or a fragment
    fn message(&mut self, raw: String) -> Flow {
        if raw == DONE_SENTINEL {
            return Flow::Continue;
        }

        if let Ok(value) = serde_json::from_str::<Value>(&raw)
            && let Some(answer) = full_answer(&value)
        {
            self.deliver_answer(answer);
            self.complete(Completion::FullMessage);
            return Flow::Stop;
        }

        if !raw.is_empty() {
            self.token(&raw);
        }
        Flow::Continue
    }

    pub(crate) fn deliver_answer(&mut self, answer: FallbackAnswer) {
        if let Some(text) = answer.text
            && !text.is_empty()
        {
            self.token(&text);
        }
        if !answer.sources.is_empty() {
            self.handler.on_source(&answer.sources);
        }
    }

    fn token(&mut self, token: &str) {
        self.metrics.record_token(token);
        self.handler.on_token(token);
    }

    /// Body ended; complete if content arrived, otherwise report an empty stream
    pub(crate) fn finish_stream(&mut self) -> Result<(), StreamError> {
        if self.state == StreamState::Completed {
            return Ok(());
        }
        if self.metrics.has_content() {
            log::debug!("Stream ended without an end event; completing with received content");
            self.complete(Completion::Synthesized);
            return Ok(());
        }
        Err(StreamError::EmptyStream)
    }

    pub(crate) fn complete(&mut self, completion: Completion) {
        if self.transition(StreamState::Completed) {
            self.completion = Some(completion);
            self.metrics.finish();
            self.handler.on_complete();
        }
    }

    pub(crate) fn fail(&mut self, error: &StreamError) {
        if self.transition(StreamState::Errored) {
            self.metrics.finish();
            self.handler.on_error(error);
        }
    }

    pub(crate) fn cancel(&mut self) {
        if self.transition(StreamState::Cancelled) {
            self.metrics.finish();
        }
    }

    pub(crate) fn into_summary(self) -> StreamSummary {
        StreamSummary {
            metrics: self.metrics,
            completion: self.completion.unwrap_or(Completion::Synthesized),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
