//! Period clock: aligned bucket boundaries and time sources.
//!
//! Every boundary is a whole multiple of the period counted from the Unix
//! epoch. All supported periods divide a day, so for periods of a minute or
//! more this is the same as aligning to minute multiples of `period / 60`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Candle periods, in seconds, the aggregator accepts.
pub const SUPPORTED_PERIODS: [u32; 9] = [5, 10, 15, 30, 60, 120, 180, 300, 600];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("unsupported period {0}s (supported: 5, 10, 15, 30, 60, 120, 180, 300, 600)")]
    Unsupported(u32),
}

/// Validated candle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Period(u32);

impl Period {
    pub fn from_secs(secs: u32) -> Result<Self, PeriodError> {
        if SUPPORTED_PERIODS.contains(&secs) {
            Ok(Self(secs))
        } else {
            Err(PeriodError::Unsupported(secs))
        }
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(i64::from(self.0))
    }

    /// Largest boundary ≤ `t`.
    pub fn align_down(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let p = i64::from(self.0);
        let secs = t.timestamp();
        let aligned = secs - secs.rem_euclid(p);
        Utc.timestamp_opt(aligned, 0).single().unwrap_or(t)
    }
}

impl TryFrom<u32> for Period {
    type Error = PeriodError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

impl From<Period> for u32 {
    fn from(p: Period) -> u32 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Next period-aligned timestamp ≥ `now`.
pub fn next_boundary(period: Period, now: DateTime<Utc>) -> DateTime<Utc> {
    let down = period.align_down(now);
    if down == now {
        now
    } else {
        down + period.duration()
    }
}

/// Time left until the next boundary. Never negative.
pub fn sleep_duration(period: Period, now: DateTime<Utc>) -> std::time::Duration {
    (next_boundary(period, now) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Source of "now" for every component that makes time-based decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
