//! Streaming performance counters
//!
//! One [`StreamMetrics`] is kept per streaming session. Timestamps use the
//! tokio clock so paused-time tests can drive them.

use std::time::Duration;

use tokio::time::Instant;

/// Counters for one streaming session
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    started_at: Instant,
    first_token_at: Option<Instant>,
    finished_at: Option<Instant>,
    pub bytes_received: u64,
    pub frames_parsed: u64,
    pub tokens_received: u64,
    pub characters_received: u64,
}

impl StreamMetrics {
    /// Start counting now
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            first_token_at: None,
            finished_at: None,
            bytes_received: 0,
            frames_parsed: 0,
            tokens_received: 0,
            characters_received: 0,
        }
    }

    pub fn record_bytes(&mut self, len: usize) {
        self.bytes_received = self.bytes_received.saturating_add(len as u64);
    }

    pub fn record_frame(&mut self) {
        self.frames_parsed += 1;
    }

    pub fn record_token(&mut self, token: &str) {
        if self.first_token_at.is_none() {
            self.first_token_at = Some(Instant::now());
        }
        self.tokens_received += 1;
        self.characters_received = self
            .characters_received
            .saturating_add(token.chars().count() as u64);
    }

    /// Stop the clock; later calls keep the first finish time
    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Instant::now());
            log::debug!(
                "Stream finished: {} tokens, {} bytes, {} frames in {:?} (first token after {:?})",
                self.tokens_received,
                self.bytes_received,
                self.frames_parsed,
                self.duration(),
                self.time_to_first_token()
            );
        }
    }

    pub fn time_to_first_token(&self) -> Option<Duration> {
        self.first_token_at
            .map(|t| t.saturating_duration_since(self.started_at))
    }

    /// Elapsed time until finish, or until now while still streaming
    pub fn duration(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }

    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs <= f64::EPSILON {
            return 0.0;
        }
        self.tokens_received as f64 / secs
    }

    pub fn has_content(&self) -> bool {
        self.tokens_received > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_time_to_first_token_and_rate() {
        let mut metrics = StreamMetrics::start();
        tokio::time::advance(Duration::from_millis(250)).await;
        metrics.record_token("Hello");
        tokio::time::advance(Duration::from_millis(750)).await;
        metrics.record_token(" world");
        metrics.finish();

        assert_eq!(
            metrics.time_to_first_token(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(metrics.duration(), Duration::from_secs(1));
        assert_eq!(metrics.tokens_received, 2);
        assert_eq!(metrics.characters_received, 11);
        assert!((metrics.tokens_per_second() - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_is_sticky() {
        let mut metrics = StreamMetrics::start();
        tokio::time::advance(Duration::from_millis(100)).await;
        metrics.finish();
        tokio::time::advance(Duration::from_millis(900)).await;
        metrics.finish();
        assert_eq!(metrics.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_counters_start_empty() {
        let mut metrics = StreamMetrics::start();
        assert!(!metrics.has_content());
        assert_eq!(metrics.time_to_first_token(), None);
        metrics.record_bytes(10);
        metrics.record_frame();
        assert_eq!(metrics.bytes_received, 10);
        assert_eq!(metrics.frames_parsed, 1);
        assert_eq!(metrics.tokens_per_second(), 0.0);
    }
}
