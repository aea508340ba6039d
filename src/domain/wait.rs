use std::time::Duration;

/// Shortest delay between two polls, whatever the configuration says.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded readiness polling: wait `grace`, then poll with exponential
/// backoff until `timeout` has elapsed since the first poll.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    pub grace: Duration,
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl WaitPolicy {
    /// Delay before poll number `attempt + 1`.
    /// Never shorter than [`MIN_INTERVAL`] and never shrinking: a multiplier
    /// below 1 (or NaN) is treated as 1.
    pub fn interval(&self, attempt: u32) -> Duration {
        let initial = self.initial_interval.max(MIN_INTERVAL);
        let ceiling = self.max_interval.max(initial);
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        if attempt == 0 || multiplier == 1.0 {
            return initial.min(ceiling);
        }

        let secs = initial.as_secs_f64() * multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
            return ceiling;
        }
        Duration::from_secs_f64(secs)
    }
}
