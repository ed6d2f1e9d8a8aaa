//! Period-aligned cycle loop.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chaosband_core::clock::{next_boundary, Clock, Period};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, ConfigError};
use crate::engine::TradingEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub refreshes: u64,
}

/// Wakes on every period boundary and runs one engine cycle.
///
/// Runs at most one cycle per boundary. A failed or panicking cycle is
/// logged and followed by a backoff pause; the loop only ends when the
/// shutdown future resolves.
pub struct Scheduler {
    period: Period,
    clock: Arc<dyn Clock>,
    refresh_every_cycles: u64,
    backoff: Duration,
    last_boundary: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("period", &self.period)
            .field("refresh_every_cycles", &self.refresh_every_cycles)
            .field("backoff", &self.backoff)
            .field("last_boundary", &self.last_boundary)
            .finish()
    }
}

impl Scheduler {
    pub fn new(period: Period, clock: Arc<dyn Clock>) -> Self {
        Self {
            period,
            clock,
            refresh_every_cycles: 0,
            backoff: Duration::from_secs(5),
            last_boundary: None,
        }
    }

    pub fn from_config(config: &BotConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Ok(Self::new(config.period()?, clock)
            .with_refresh_every(config.refresh_every_cycles)
            .with_backoff(Duration::from_secs(config.cycle_backoff_secs)))
    }

    pub fn with_refresh_every(mut self, cycles: u64) -> Self {
        self.refresh_every_cycles = cycles;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Next boundary to run at: the next aligned time at or after `now`,
    /// skipping any boundary a cycle already ran for.
    pub fn next_wake(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = next_boundary(self.period, now);
        match self.last_boundary {
            Some(last) if next <= last => last + self.period.duration(),
            _ => next,
        }
    }

    pub async fn run<F>(&mut self, engine: &mut TradingEngine, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = SchedulerStats::default();

        loop {
            let now = self.clock.now();
            let wake = self.next_wake(now);
            let wait = (wake - now).to_std().unwrap_or(Duration::ZERO);
            debug!(%wake, wait_secs = wait.as_secs_f64(), "waiting for candle close");
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(wait) => {}
            }
            self.last_boundary = Some(wake);
            stats.cycles += 1;

            let failed = match AssertUnwindSafe(engine.run_cycle()).catch_unwind().await {
                Ok(Ok(_)) => false,
                Ok(Err(e)) => {
                    error!(cycle = stats.cycles, error = %e, "cycle failed");
                    true
                }
                Err(panic) => {
                    error!(
                        cycle = stats.cycles,
                        panic = %panic_message(panic.as_ref()),
                        "cycle panicked"
                    );
                    true
                }
            };
            if failed {
                stats.failed_cycles += 1;
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }

            if self.refresh_every_cycles > 0 && stats.cycles % self.refresh_every_cycles == 0 {
                match engine.refresh_instruments().await {
                    Ok(count) => {
                        stats.refreshes += 1;
                        info!(count, "instrument universe refreshed");
                    }
                    Err(e) => warn!(error = %e, "instrument refresh failed"),
                }
            }
        }

        info!(
            cycles = stats.cycles,
            failed = stats.failed_cycles,
            "scheduler stopped"
        );
        stats
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
