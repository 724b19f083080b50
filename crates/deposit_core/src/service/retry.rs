//! Bounded retry policy for notification delivery.
//!
//! # Responsibility
//! - Describe how many publish attempts are made and how long to wait
//!   between them.
//!
//! # Invariants
//! - At least one attempt is always made.
//! - Delays grow exponentially and never exceed `max_delay`.
//! - Delay math is integer-only and saturating.

use std::time::Duration;

/// Total attempts made by default: the first publish plus seven retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Retry policy for `EventBus::publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Cap for the exponential delay.
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for PublishRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl PublishRetryPolicy {
    /// Retries back-to-back with no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Returns a copy with a different attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempt budget, normalized so publish is attempted at least once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry_index` (0 = wait before the 2nd attempt).
    ///
    /// `initial_delay * multiplier^retry_index`, capped at `max_delay`.
    pub fn delay_before_retry(&self, retry_index: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(retry_index);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}
