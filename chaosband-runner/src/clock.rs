//! Wall clock driven by the tokio timer.

use chaosband_core::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Reports `anchor + elapsed tokio time`.
///
/// Outside of tests this tracks the system clock closely. Under a paused
/// tokio runtime it moves only when tokio time advances, so sleeps and
/// timestamps stay consistent with each other.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    /// Anchor at the current system time.
    pub fn new() -> Self {
        Self::anchored(Utc::now())
    }

    /// Anchor at an arbitrary wall time. Must be called inside a runtime.
    pub fn anchored(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.started);
        self.wall + Duration::from_std(elapsed).unwrap_or(Duration::zero())
    }
}
