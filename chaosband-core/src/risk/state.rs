use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::RiskConfig;
use crate::domain::{Outcome, TradeId};

/// Risk state for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub martingale_step: u32,
    pub current_stake: f64,
    /// Sum of stakes lost since the last martingale reset.
    pub total_loss: f64,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub active_trade_count: u32,
    pub consecutive_losses: u32,
    pub total_trades: u64,
    pub last_trade_id: Option<TradeId>,
}

impl InstrumentState {
    pub fn new(base_stake: f64) -> Self {
        Self {
            martingale_step: 0,
            current_stake: base_stake,
            total_loss: 0.0,
            cooldown_until: None,
            active_trade_count: 0,
            consecutive_losses: 0,
            total_trades: 0,
            last_trade_id: None,
        }
    }

    /// Gate a new trade. Checks run in order: cooldown, concurrency, losses.
    pub fn eligibility(&self, config: &RiskConfig, now: DateTime<Utc>) -> Eligibility {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return Eligibility::CoolingDown { until };
            }
        }
        if self.active_trade_count >= config.max_trades_per_pair {
            return Eligibility::MaxConcurrent {
                active: self.active_trade_count,
                limit: config.max_trades_per_pair,
            };
        }
        if self.consecutive_losses >= config.loss_circuit_breaker_threshold {
            return Eligibility::CircuitBreakerOpen {
                losses: self.consecutive_losses,
                threshold: config.loss_circuit_breaker_threshold,
            };
        }
        Eligibility::Eligible
    }

    /// Apply a trade outcome to the stake ladder and return the next stake.
    ///
    /// `None` leaves the ladder untouched. Ties and timeouts never move it.
    pub fn next_stake(&mut self, config: &RiskConfig, last_outcome: Option<Outcome>) -> f64 {
        let m = &config.martingale;
        if !m.enabled {
            return config.base_stake;
        }
        match last_outcome {
            Some(Outcome::Lost) if self.martingale_step < m.max_steps => {
                self.martingale_step += 1;
                self.total_loss += self.current_stake;
                self.current_stake *= m.multiplier;
            }
            Some(Outcome::Won) if m.reset_on_win => self.reset_martingale(config.base_stake),
            _ => {}
        }
        self.current_stake
    }

    pub fn reset_martingale(&mut self, base_stake: f64) {
        self.martingale_step = 0;
        self.current_stake = base_stake;
        self.total_loss = 0.0;
    }
}

/// Result of the eligibility gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    CoolingDown { until: DateTime<Utc> },
    MaxConcurrent { active: u32, limit: u32 },
    CircuitBreakerOpen { losses: u32, threshold: u32 },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Eligible => "ok",
            Self::CoolingDown { .. } => "cooldown period active",
            Self::MaxConcurrent { .. } => "maximum concurrent trades reached",
            Self::CircuitBreakerOpen { .. } => "too many consecutive losses",
        }
    }
}
