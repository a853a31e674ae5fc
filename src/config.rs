//! Configuration loading
//!
//! Reads `~/.config/medimind/config.toml`. A missing file means defaults;
//! a file that exists but cannot be parsed is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod types;

pub use types::{AuthConfig, BreakerConfig, Config, EndpointConfig, RetryConfig, StreamConfig};

use crate::error::ConfigError;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

const CONFIG_DIR: &str = "medimind";
const CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from `path`, or from [`Config::default_path`]
    ///
    /// Missing files yield [`Config::default`]. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::Toml { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the streaming layer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "stream.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) is smaller than retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        if self.endpoint.path.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.path is empty".to_string()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_retries: self.retry.max_retries,
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            reset_timeout: Duration::from_secs(self.circuit_breaker.reset_timeout_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
