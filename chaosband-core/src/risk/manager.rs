use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::config::RiskConfig;
use super::state::{Eligibility, InstrumentState};
use crate::clock::Clock;
use crate::domain::{Outcome, TradeId};

/// A slot and stake taken for one trade, pending broker confirmation.
///
/// Hand it back through `RiskManager::rollback` if placement fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub instrument: String,
    pub stake: f64,
    pub reserved_at: DateTime<Utc>,
    prior_cooldown: Option<DateTime<Utc>>,
}

/// Per-instrument risk state.
///
/// Each instrument's state sits behind its own mutex; operations on different
/// instruments never contend. States are created on first reference and live
/// for the life of the manager.
pub struct RiskManager {
    config: RiskConfig,
    clock: Arc<dyn Clock>,
    states: DashMap<String, Arc<Mutex<InstrumentState>>>,
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("config", &self.config)
            .field("instruments", &self.states.len())
            .finish()
    }
}

impl RiskManager {
    pub fn new(config: RiskConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            states: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    fn state(&self, instrument: &str) -> Arc<Mutex<InstrumentState>> {
        if let Some(existing) = self.states.get(instrument) {
            return Arc::clone(existing.value());
        }
        let base = self.config.base_stake;
        Arc::clone(
            self.states
                .entry(instrument.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(InstrumentState::new(base))))
                .value(),
        )
    }

    pub fn is_eligible(&self, instrument: &str) -> Eligibility {
        let now = self.clock.now();
        self.state(instrument).lock().eligibility(&self.config, now)
    }

    /// Apply `last_outcome` to the stake ladder and return the stake for the
    /// next trade.
    pub fn stake_for(&self, instrument: &str, last_outcome: Option<Outcome>) -> f64 {
        self.state(instrument)
            .lock()
            .next_stake(&self.config, last_outcome)
    }

    /// Count a trade the broker already accepted. A cooldown too long to
    /// represent saturates at the latest representable instant.
    pub fn on_trade_accepted(&self, instrument: &str) {
        let now = self.clock.now();
        let until = self.cooldown_end(now).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let state = self.state(instrument);
        let mut s = state.lock();
        accept(&mut s, until);
        debug!(instrument, active = s.active_trade_count, "trade accepted");
    }

    /// End of the cooldown that starts at `now`, or `None` when it would
    /// fall outside the representable range.
    fn cooldown_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.config.cooldown_secs).ok()?;
        now.checked_add_signed(TimeDelta::try_seconds(secs)?)
    }

    /// Release the trade's slot and feed the outcome into the loss streak
    /// and the stake ladder.
    pub fn on_trade_resolved(&self, instrument: &str, outcome: Outcome) {
        let state = self.state(instrument);
        let mut s = state.lock();
        s.active_trade_count = s.active_trade_count.saturating_sub(1);
        match outcome {
            Outcome::Won => s.consecutive_losses = 0,
            Outcome::Lost => s.consecutive_losses += 1,
            Outcome::Tie | Outcome::TimedOut => {}
        }
        let next = s.next_stake(&self.config, Some(outcome));
        debug!(
            instrument,
            %outcome,
            step = s.martingale_step,
            next_stake = next,
            consecutive_losses = s.consecutive_losses,
            "trade resolved"
        );
    }

    /// Eligibility check, stake lookup and acceptance under one lock.
    pub fn reserve(&self, instrument: &str) -> Result<Reservation, Eligibility> {
        let now = self.clock.now();
        let state = self.state(instrument);
        let mut s = state.lock();

        let eligibility = s.eligibility(&self.config, now);
        if !eligibility.is_eligible() {
            return Err(eligibility);
        }

        let Some(until) = self.cooldown_end(now) else {
            return Err(Eligibility::CoolingDown {
                until: DateTime::<Utc>::MAX_UTC,
            });
        };
        let stake = s.next_stake(&self.config, None);
        let prior_cooldown = s.cooldown_until;
        accept(&mut s, until);
        debug!(instrument, stake, active = s.active_trade_count, "slot reserved");

        Ok(Reservation {
            instrument: instrument.to_string(),
            stake,
            reserved_at: now,
            prior_cooldown,
        })
    }

    /// Undo a reservation whose order never reached the broker.
    pub fn rollback(&self, reservation: &Reservation) {
        let state = self.state(&reservation.instrument);
        let mut s = state.lock();
        s.active_trade_count = s.active_trade_count.saturating_sub(1);
        s.total_trades = s.total_trades.saturating_sub(1);
        s.cooldown_until = reservation.prior_cooldown;
        debug!(
            instrument = %reservation.instrument,
            active = s.active_trade_count,
            "reservation rolled back"
        );
    }

    pub fn record_trade_id(&self, instrument: &str, id: TradeId) {
        self.state(instrument).lock().last_trade_id = Some(id);
    }

    pub fn reset_martingale(&self, instrument: &str) {
        self.state(instrument)
            .lock()
            .reset_martingale(self.config.base_stake);
        debug!(instrument, "martingale reset");
    }

    /// Copy of one instrument's state, if it has been referenced.
    pub fn snapshot(&self, instrument: &str) -> Option<InstrumentState> {
        self.states.get(instrument).map(|s| s.value().lock().clone())
    }

    /// Copies of every known instrument's state, sorted by instrument.
    pub fn snapshot_all(&self) -> Vec<(String, InstrumentState)> {
        let mut all: Vec<_> = self
            .states
            .iter()
            .map(|e| (e.key().clone(), e.value().lock().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn total_active_trades(&self) -> u32 {
        self.states
            .iter()
            .map(|e| e.value().lock().active_trade_count)
            .sum()
    }
}

fn accept(s: &mut InstrumentState, cooldown_until: DateTime<Utc>) {
    s.active_trade_count += 1;
    s.total_trades += 1;
    s.cooldown_until = Some(cooldown_until);
}
