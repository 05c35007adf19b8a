//! Capped exponential backoff between recovery attempts.

use std::time::Duration;

/// Exponential backoff parameters.
///
/// The delay for attempt `n` is `min(base * 2^n, max)`, so attempt 0 waits
/// `base`. No jitter is applied: recovery attempts for one service are
/// already serialized and the delay must never shrink between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the attempt following `attempt` earlier failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base.as_millis() as u64, self.max.as_millis() as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Calculate capped exponential backoff delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponential_base = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}
