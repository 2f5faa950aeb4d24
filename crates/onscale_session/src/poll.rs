use std::time::Duration;

/// Backoff schedule for waiting on a job.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub factor: u32,
    /// Overall limit. `None` waits until the job ends or the wait is cancelled.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(60),
            factor: 2,
            timeout: None,
        }
    }
}

impl PollPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max.max(initial);
        self
    }

    /// Interval following `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.factor.max(1))
            .min(self.max_interval)
    }
}
