//! A clock that follows tokio's time source.

use autotest_engine::{Clock, SystemClock, Timestamp};
use tokio::time::Instant;

/// Wall-clock milliseconds anchored at construction and advanced by tokio's
/// monotonic clock.
///
/// Deadlines computed from it line up with `tokio::time::sleep`, including
/// under a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_ms: Timestamp,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now())
    }

    /// A clock that reads `origin_ms` right now.
    pub fn starting_at(origin_ms: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.origin_ms + self.origin.elapsed().as_millis() as Timestamp
    }
}
