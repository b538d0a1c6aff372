//! Whole-upload retry policy.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shortest backoff sleep, whatever the jitter.
pub const MIN_DELAY: Duration = Duration::from_millis(50);

/// Exponential backoff between whole-upload attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. 1 disables retrying.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after a failed attempt (1-based), with ±25% jitter drawn from
    /// the clock.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.jittered_delay(attempt, clock_jitter())
    }

    /// Delay after a failed attempt for a given jitter `offset` in [-1, 1].
    ///
    /// The base delay grows by `backoff_factor` per attempt up to
    /// `max_delay`; the offset moves it by up to a quarter either way. The
    /// result never drops below [`MIN_DELAY`].
    pub fn jittered_delay(&self, attempt: u32, offset: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let base = (self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let spread = base * 0.25 * offset.clamp(-1.0, 1.0);
        Duration::from_secs_f64(base + spread).max(MIN_DELAY)
    }

    /// Returns `true` if another attempt is allowed after `attempt` failed.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Pseudo-random offset in [-1, 1) from the sub-second clock.
fn clock_jitter() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos) / 1e9 * 2.0 - 1.0
}
