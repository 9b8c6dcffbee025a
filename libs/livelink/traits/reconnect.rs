use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the connection manager waits
/// before each retry and when it gives up.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the given reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt number (1-indexed, already incremented)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if the given attempt is still allowed
    fn should_reconnect(&self, attempt: u32) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delay before attempt `k` is `initial_delay * decay^(k-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    decay: f64,
    max_attempts: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - Delay before the first retry
    /// * `max_delay` - Upper bound for any delay
    /// * `decay` - Growth factor between consecutive delays
    /// * `max_attempts` - Maximum number of retries (0 = unlimited)
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        decay: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            decay,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.decay.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;

        // f64 -> u64 casts saturate, so an overflowing power clamps to max_ms
        Some(Duration::from_millis(delay_ms.min(max_ms) as u64))
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }
}
