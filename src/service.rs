//! Streaming service
//!
//! Wraps [`SseClient`] with everything a chat request needs around the raw
//! stream: a bearer token from the session provider, endpoint resolution,
//! duplicate-connection suppression through the [`ConnectionRegistry`], and a
//! wall-clock timeout.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::auth::SessionProvider;
use crate::client::{SseClient, SseRequest, StreamSummary};
use crate::error::StreamError;
use crate::handler::StreamHandler;
use crate::registry::{ConnectionKey, ConnectionRegistry, signature_of};

/// Default wall-clock limit for one request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Path that flow ids are resolved under
pub const DEFAULT_PREDICTION_PATH: &str = "/api/v1/prediction";

/// Request body for a chat backend
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPayload {
    pub question: String,
    pub session_id: Option<String>,
    pub streaming: bool,
    pub uploads: Option<Vec<Value>>,
    pub knowledge_base: Option<Value>,
}

impl ChatPayload {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: None,
            streaming: true,
            uploads: None,
            knowledge_base: None,
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn uploads(mut self, uploads: Vec<Value>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn knowledge_base(mut self, knowledge_base: Value) -> Self {
        self.knowledge_base = Some(knowledge_base);
        self
    }

    /// Hash of the question; two payloads with the same question share a key
    pub fn signature(&self) -> u64 {
        signature_of(&self.question)
    }

    /// Wire body: `{question, overrideConfig: {sessionId}, streaming, uploads?, knowledgeBase?}`
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("question".into(), json!(self.question));
        if let Some(session_id) = &self.session_id {
            body.insert("overrideConfig".into(), json!({ "sessionId": session_id }));
        }
        body.insert("streaming".into(), json!(self.streaming));
        if let Some(uploads) = &self.uploads {
            body.insert("uploads".into(), json!(uploads));
        }
        if let Some(knowledge_base) = &self.knowledge_base {
            body.insert("knowledgeBase".into(), knowledge_base.clone());
        }
        Value::Object(body)
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Wall-clock limit; the service default applies when unset
    pub timeout: Option<Duration>,
    /// Caller-side cancellation
    pub cancel: Option<CancellationToken>,
}

impl StreamOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Authenticated, deduplicated, time-limited streaming
pub struct StreamingService {
    client: SseClient,
    registry: Arc<ConnectionRegistry>,
    session: Arc<dyn SessionProvider>,
    base_url: Option<Url>,
    prediction_path: String,
    default_timeout: Duration,
}

impl StreamingService {
    pub fn new(
        client: SseClient,
        registry: Arc<ConnectionRegistry>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            client,
            registry,
            session,
            base_url: None,
            prediction_path: DEFAULT_PREDICTION_PATH.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_prediction_path(mut self, path: impl Into<String>) -> Self {
        self.prediction_path = path.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Resolve `endpoint` to a URL
    ///
    /// Absolute URLs are used as-is. A value starting with `/` is a path on
    /// the base URL; anything else is a flow id under the prediction path.
    pub fn resolve_endpoint(&self, endpoint: &str) -> Result<Url, StreamError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(StreamError::NotConfigured("endpoint is empty".into()));
        }
        if let Ok(url) = Url::parse(endpoint) {
            return Ok(url);
        }

        let base = self.base_url.as_ref().ok_or_else(|| {
            StreamError::NotConfigured(format!("no base URL to resolve '{endpoint}' against"))
        })?;
        let path = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.prediction_path.trim_end_matches('/'), endpoint)
        };
        base.join(&path)
            .map_err(|e| StreamError::NotConfigured(format!("invalid endpoint '{endpoint}': {e}")))
    }

    /// Stream the answer for `payload` from `endpoint` into `handler`
    ///
    /// A request already in flight under the same endpoint and question is
    /// cancelled first. Every failure except cancellation reaches
    /// `handler.on_error` exactly once; the registry entry is released on
    /// every exit path.
    pub async fn fetch_streaming_response<H: StreamHandler + ?Sized>(
        &self,
        endpoint: &str,
        payload: &ChatPayload,
        handler: &mut H,
        options: &StreamOptions,
    ) -> Result<StreamSummary, StreamError> {
        let request = match self.prepare(endpoint, payload).await {
            Ok(request) => request,
            Err(err) => {
                log::debug!("Request to {endpoint} rejected before sending: {err}");
                handler.on_error(&err);
                return Err(err);
            }
        };

        let cancel = match &options.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let _guard = self.registry.register(
            ConnectionKey::new(endpoint, payload.signature()),
            cancel.clone(),
        );

        let outcome =
            tokio::time::timeout(timeout, self.client.fetch_sse(&request, &mut *handler, &cancel))
                .await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let err = StreamError::Timeout(timeout);
                log::debug!("Request to {endpoint} timed out after {timeout:?}");
                handler.on_error(&err);
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        endpoint: &str,
        payload: &ChatPayload,
    ) -> Result<SseRequest, StreamError> {
        let token = self
            .session
            .access_token()
            .await?
            .ok_or_else(|| StreamError::Auth("no valid session".into()))?;
        let url = self.resolve_endpoint(endpoint)?;
        SseRequest::post_json(url, payload.to_body()).bearer(&token)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
