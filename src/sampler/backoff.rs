use std::time::Duration;

/// Stretches the wait between ticks while reads keep failing.
///
/// With `max == interval` the delay never changes.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(interval: Duration, max: Duration) -> Self {
        let max = max.max(interval);
        Self {
            interval,
            max,
            current: interval,
        }
    }

    /// Delay to wait before the next tick.
    pub fn delay(&self) -> Duration {
        self.current
    }

    pub fn mark_failure(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }

    pub fn mark_success(&mut self) {
        self.current = self.interval;
    }
}
