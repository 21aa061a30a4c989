//! Reconnect pacing for transport event loops.

use std::time::Duration;

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    /// Exponential backoff with jitter.
    ///
    /// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::as_conversions)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16) as i32;
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        // Deterministic jitter seeded from the attempt number.
        let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
        Duration::from_secs_f64((capped * jitter_factor).max(0.0))
    }
}
