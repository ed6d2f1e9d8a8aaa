use serde::{Deserialize, Serialize};

/// Martingale stake escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MartingaleConfig {
    pub enabled: bool,
    pub multiplier: f64,
    /// Escalation stops after this many consecutive multiplications.
    pub max_steps: u32,
    /// Return to the base stake after a win. When false the elevated stake
    /// persists until an explicit reset.
    pub reset_on_win: bool,
}

impl Default for MartingaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            multiplier: 2.0,
            max_steps: 3,
            reset_on_win: true,
        }
    }
}

/// Per-instrument gating and sizing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub base_stake: f64,
    pub martingale: MartingaleConfig,
    pub max_trades_per_pair: u32,
    pub cooldown_secs: u64,
    pub loss_circuit_breaker_threshold: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            base_stake: 100.0,
            martingale: MartingaleConfig::default(),
            max_trades_per_pair: 3,
            cooldown_secs: 300,
            loss_circuit_breaker_threshold: 3,
        }
    }
}

impl RiskConfig {
    /// Stake at the top of the martingale ladder.
    pub fn max_stake(&self) -> f64 {
        if !self.martingale.enabled {
            return self.base_stake;
        }
        self.base_stake * self.martingale.multiplier.powi(self.martingale.max_steps as i32)
    }
}
