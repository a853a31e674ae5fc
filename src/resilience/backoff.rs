//! Exponential backoff with jitter

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::StreamError;

/// Largest jitter as a fraction of the capped delay
const JITTER_RATIO: f64 = 0.1;

/// `min(base * 2^attempt, max)` plus up to 10% jitter
///
/// # Arguments
/// * `attempt` - Zero-based retry attempt
/// * `base` - Delay before the first retry
/// * `max` - Cap applied before jitter
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let capped = capped_delay(attempt, base, max);
    let jitter_ceiling = (capped.as_millis() as f64 * JITTER_RATIO) as u64;
    let jitter = if jitter_ceiling == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ceiling)
    };
    capped.saturating_add(Duration::from_millis(jitter))
}

fn capped_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

/// How often and how patiently to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails terminally, or retries run out
///
/// The closure receives the zero-based attempt number. Only errors for which
/// [`StreamError::is_retryable`] holds are retried.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, StreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StreamError>>,
{
    retry_with_backoff_if(policy, StreamError::is_retryable, operation).await
}

/// Like [`retry_with_backoff`], retrying only errors accepted by `should_retry`
pub async fn retry_with_backoff_if<T, P, F, Fut>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, StreamError>
where
    P: Fn(&StreamError) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StreamError>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && should_retry(&err) => {
                let delay = policy.delay_for_attempt(attempt);
                log::debug!(
                    "Attempt {} failed ({}); retrying in {:?}",
                    attempt + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
