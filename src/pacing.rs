// ============================================================================
// pacing.rs — gpulife
// Fixed-interval tick scheduling for the frame driver.
// ============================================================================

use std::time::{Duration, Instant};

/// Tracks when the next tick is due. A cancelled pacer never reports a tick
/// as due until it is started again.
#[derive(Clone, Debug)]
pub struct TickPacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl TickPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Make a tick due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    /// Schedule the next tick one interval after `now`.
    pub fn schedule_after(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn is_scheduled(&self) -> bool {
        self.next_due.is_some()
    }
}
