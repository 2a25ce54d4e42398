//! Reconnect backoff schedule

use std::time::Duration;

/// Backoff parameters for reconnect scheduling
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,

    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30), // cap after 5 doublings
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-indexed):
    /// `min(initial * 2^(attempt-1), max)`.
    ///
    /// Derived purely from the attempt number, never from the previous
    /// delay, so the schedule is stable across calls.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.as_secs_f64() * 2f64.powi(exp as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}
