//! Session lookup for authenticated requests
//!
//! The service asks a [`SessionProvider`] for an access token before every
//! request. `Ok(None)` means "no session", which the service reports as an
//! authentication failure without touching the network.

use async_trait::async_trait;

use crate::error::StreamError;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current access token, if a session exists
    async fn access_token(&self) -> Result<Option<String>, StreamError>;
}

/// Fixed token, or none
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Result<Option<String>, StreamError> {
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every request
#[derive(Debug, Clone)]
pub struct EnvSession {
    var: String,
}

impl EnvSession {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl SessionProvider for EnvSession {
    async fn access_token(&self) -> Result<Option<String>, StreamError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(StreamError::Auth(format!(
                "{} is not valid unicode",
                self.var
            ))),
        }
    }
}
