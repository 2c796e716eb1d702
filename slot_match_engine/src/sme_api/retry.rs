use std::time::Duration;

/// A bounded retry schedule with doubling backoff. Owned by whoever drives a retryable call, not
/// baked into the call itself, so the sweep and an operator tool can pick different schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_backoff }
    }

    /// A single attempt, no waiting.
    pub fn no_retries() -> Self {
        Self { max_attempts: 1, initial_backoff: Duration::ZERO }
    }

    /// How long to wait after the given failed attempt (1-based) before the next one.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.initial_backoff * 2u32.pow(doublings)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff: Duration::from_secs(5) }
    }
}
