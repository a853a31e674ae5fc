// Configuration type definitions

use std::time::Duration;

use serde::Deserialize;

/// Backend endpoint section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Base URL the endpoint path is resolved against
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path (or absolute URL) of the chat prediction endpoint
    #[serde(default = "default_endpoint_path")]
    pub path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            base_url: None,
            path: default_endpoint_path(),
        }
    }
}

fn default_endpoint_path() -> String {
    "/api/v1/prediction".to_string()
}

/// Streaming behaviour section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Turn field-less lines into token frames (needed for some backends)
    #[serde(default = "default_true")]
    pub coerce_bare_lines: bool,
    /// Hold back incomplete critical medical content while streaming
    #[serde(default = "default_true")]
    pub medical_filter: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            timeout_secs: default_timeout_secs(),
            debounce_ms: default_debounce_ms(),
            coerce_bare_lines: true,
            medical_filter: true,
        }
    }
}

impl StreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

/// Retry section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

/// Circuit breaker section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    60
}

/// Authentication section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    "MEDIMIND_ACCESS_TOKEN".to_string()
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}
