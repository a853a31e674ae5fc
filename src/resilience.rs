//! Retry and failure isolation around streaming calls

mod backoff;
mod circuit_breaker;

pub use backoff::{RetryPolicy, calculate_backoff, retry_with_backoff, retry_with_backoff_if};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ServiceHealthMetrics,
};
