//! Per-service circuit breaker
//!
//! Each named service moves through three states:
//!
//! ```text
//! Closed --threshold failures--> Open --reset_timeout--> HalfOpen
//!   ^                                                       |
//!   +------------------- trial succeeds --------------------+
//!                        trial fails -> Open
//! ```
//!
//! Any success resets the failure counter. Half-open admits a single trial
//! request at a time; a trial that never reports back stops blocking others
//! after `reset_timeout`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::StreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial is allowed
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Request counters for one service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceHealthMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
    total_response_time: Duration,
}

impl ServiceHealthMetrics {
    fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        self.total_response_time = self.total_response_time.saturating_add(elapsed);
        let count = u32::try_from(self.total_requests).unwrap_or(u32::MAX);
        self.average_response_time = self.total_response_time / count;
    }

    /// Fraction of requests that succeeded, 1.0 before any request
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

#[derive(Debug)]
struct ServiceCircuit {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_started: Option<Instant>,
    metrics: ServiceHealthMetrics,
}

impl Default for ServiceCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            trial_started: None,
            metrics: ServiceHealthMetrics::default(),
        }
    }
}

impl ServiceCircuit {
    fn cooled_down(&self, reset_timeout: Duration) -> bool {
        self.last_failure.is_none_or(|at| at.elapsed() >= reset_timeout)
    }

    fn trial_in_flight(&self, reset_timeout: Duration) -> bool {
        self.trial_started.is_some_and(|at| at.elapsed() < reset_timeout)
    }
}

/// Circuit breakers keyed by service name
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    services: Mutex<HashMap<String, ServiceCircuit>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            services: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServiceCircuit>> {
        self.services
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, reporting `HalfOpen` once an open circuit has cooled down
    pub fn state(&self, service: &str) -> CircuitState {
        match self.lock().get(service) {
            None => CircuitState::Closed,
            Some(circuit) => match circuit.state {
                CircuitState::Open if circuit.cooled_down(self.config.reset_timeout) => {
                    CircuitState::HalfOpen
                }
                state => state,
            },
        }
    }

    /// Whether a request may go out now
    ///
    /// A `true` answer for a cooled-down or half-open circuit reserves the
    /// single trial slot; the caller must report the outcome.
    pub fn can_attempt(&self, service: &str) -> bool {
        let mut services = self.lock();
        let circuit = services.entry(service.to_string()).or_default();
        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if !circuit.cooled_down(self.config.reset_timeout) {
                    return false;
                }
                log::info!("Circuit for '{service}' half-open; allowing a trial request");
                circuit.state = CircuitState::HalfOpen;
                circuit.trial_started = Some(Instant::now());
                true
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight(self.config.reset_timeout) {
                    return false;
                }
                if circuit.trial_started.is_some() {
                    log::warn!(
                        "Trial request for '{service}' never reported back; allowing another"
                    );
                }
                circuit.trial_started = Some(Instant::now());
                true
            }
        }
    }

    pub fn record_success(&self, service: &str, elapsed: Duration) {
        let mut services = self.lock();
        let circuit = services.entry(service.to_string()).or_default();
        circuit.metrics.record(true, elapsed);
        if circuit.state != CircuitState::Closed {
            log::info!("Circuit for '{service}' closed after a successful request");
        }
        circuit.state = CircuitState::Closed;
        circuit.failure_count = 0;
        circuit.trial_started = None;
    }

    pub fn record_failure(&self, service: &str, elapsed: Duration) {
        let threshold = self.config.failure_threshold;
        let mut services = self.lock();
        let circuit = services.entry(service.to_string()).or_default();
        circuit.metrics.record(false, elapsed);
        circuit.failure_count = circuit.failure_count.saturating_add(1);
        circuit.last_failure = Some(Instant::now());
        circuit.trial_started = None;

        match circuit.state {
            CircuitState::HalfOpen => {
                log::info!("Trial request for '{service}' failed; circuit re-opened");
                circuit.state = CircuitState::Open;
            }
            CircuitState::Closed if circuit.failure_count >= threshold => {
                log::info!(
                    "Circuit for '{service}' opened after {} consecutive failures",
                    circuit.failure_count
                );
                circuit.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    /// Snapshot of the service's request counters
    pub fn metrics(&self, service: &str) -> ServiceHealthMetrics {
        self.lock()
            .get(service)
            .map(|circuit| circuit.metrics.clone())
            .unwrap_or_default()
    }

    /// Forget all state for `service`
    pub fn reset(&self, service: &str) {
        self.lock().remove(service);
    }

    /// Run `operation` through the breaker
    ///
    /// Rejects with [`StreamError::CircuitOpen`] while the circuit is open.
    /// Cancellation, or dropping the returned future before it completes,
    /// releases a reserved trial slot without counting as an outcome.
    pub async fn execute<T, Fut>(&self, service: &str, operation: Fut) -> Result<T, StreamError>
    where
        Fut: Future<Output = Result<T, StreamError>>,
    {
        if !self.can_attempt(service) {
            return Err(StreamError::CircuitOpen {
                service: service.to_string(),
            });
        }

        let mut trial = TrialGuard {
            breaker: self,
            service,
            armed: true,
        };
        let started = Instant::now();
        let result = operation.await;
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => self.record_success(service, elapsed),
            Err(err) if err.is_cancellation() => {}
            Err(_) => self.record_failure(service, elapsed),
        }
        trial.armed = result.as_ref().is_err_and(StreamError::is_cancellation);
        result
    }

    fn release_trial(&self, service: &str) {
        if let Some(circuit) = self.lock().get_mut(service) {
            circuit.trial_started = None;
        }
    }
}

/// Releases the trial slot if `execute` ends without recording an outcome
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    service: &'a str,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial(self.service);
        }
    }
}
