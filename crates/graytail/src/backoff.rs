use std::time::Duration;

pub const MIN_DELAY: Duration = Duration::from_millis(200);
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay policy between poll cycles: poll fast right after activity,
/// double the delay during quiet periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: MIN_DELAY,
            max: MAX_DELAY,
        }
    }
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn initial(&self) -> Duration {
        self.min
    }

    pub fn next_delay(&self, previous: Duration, found_new: bool) -> Duration {
        if found_new {
            return self.min;
        }
        previous.saturating_mul(2).clamp(self.min, self.max)
    }
}
