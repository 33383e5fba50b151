//! Flush clock. Decides when the durability task's period has elapsed.

use std::time::{Duration, Instant};

/// How often the durability task wakes up.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct FlushClock {
    last_flush: Instant,
}

impl FlushClock {
    pub fn new(now: Instant) -> Self {
        Self { last_flush: now }
    }

    /// True once strictly more than `period` has passed since the last mark.
    pub fn is_due(&self, now: Instant, period: Duration) -> bool {
        now.saturating_duration_since(self.last_flush) > period
    }

    /// Restart the period, whether or not anything was written.
    pub fn mark(&mut self, now: Instant) {
        self.last_flush = now;
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }
}
