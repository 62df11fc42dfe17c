//! Bounded restart backoff
//!
//! Replaces open-ended shell reconnect loops with an explicit policy:
//! exponentially growing delay, capped, with a finite retry budget
//! after which the role settles in Failed.

use std::time::Duration;

/// Restart policy applied after an unexpected process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Maximum automatic restarts before settling in Failed
    pub max_retries: u32,
    /// Delay before the first restart attempt
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
}

impl RestartPolicy {
    /// Default policy for the encoder's reconnect behavior.
    pub fn encoder_default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before restart attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}
