//! Bot configuration — TOML on disk, validated once at startup.
//!
//! Every option has a default, so a config file only needs the values it
//! changes. `validate` rejects anything the trading loop could trip over
//! later; nothing is re-checked mid-run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chaosband_core::clock::{Period, SUPPORTED_PERIODS};
use chaosband_core::risk::{MartingaleConfig, RiskConfig};
use chaosband_core::signal::{
    EvaluatorConfig, SignalEvaluator, StrategyConfig, TrendFilter, VolatilityFilter,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paper::PaperConfig;
use crate::telemetry::TelemetryConfig;
use crate::tracker::TrackerConfig;

/// Longest accepted duration setting, in seconds.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Highest accepted martingale step count.
pub const MAX_MARTINGALE_STEPS: u32 = 32;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot fingerprint config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Complete bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub base_stake: f64,
    pub period_secs: u32,
    pub expiration_secs: u64,
    pub min_payout_percent: f64,
    pub max_trades_per_pair: u32,
    pub cooldown_secs: u64,
    pub confirmation_bars: usize,
    pub loss_circuit_breaker_threshold: u32,
    pub min_history: usize,
    pub body_expansion: bool,
    /// Candles kept per instrument.
    pub history_capacity: usize,
    /// Only trade these instruments. Empty means every instrument that
    /// passes the payout filter.
    pub instruments: Vec<String>,
    /// Re-select instruments every N cycles; 0 disables.
    pub refresh_every_cycles: u64,
    /// Pause after a failed cycle.
    pub cycle_backoff_secs: u64,
    // Sub-tables must follow every scalar option in TOML output.
    pub strategy: StrategyConfig,
    pub martingale: MartingaleConfig,
    pub volatility_filter: VolatilityFilter,
    pub trend_filter: TrendFilter,
    pub tracker: TrackerConfig,
    pub paper: PaperConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        let evaluator = EvaluatorConfig::default();
        let risk = RiskConfig::default();
        Self {
            base_stake: risk.base_stake,
            period_secs: 60,
            expiration_secs: 180,
            min_payout_percent: 80.0,
            max_trades_per_pair: risk.max_trades_per_pair,
            cooldown_secs: risk.cooldown_secs,
            confirmation_bars: evaluator.confirmation_bars,
            loss_circuit_breaker_threshold: risk.loss_circuit_breaker_threshold,
            min_history: evaluator.min_history,
            body_expansion: evaluator.body_expansion,
            history_capacity: chaosband_core::aggregate::DEFAULT_CAPACITY,
            instruments: Vec::new(),
            refresh_every_cycles: 10,
            cycle_backoff_secs: 5,
            strategy: evaluator.strategy,
            martingale: risk.martingale,
            volatility_filter: evaluator.volatility_filter,
            trend_filter: evaluator.trend_filter,
            tracker: TrackerConfig::default(),
            paper: PaperConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl BotConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_stake.is_finite() || self.base_stake <= 0.0 {
            return Err(invalid("base_stake", "must be a positive amount"));
        }
        if !SUPPORTED_PERIODS.contains(&self.period_secs) {
            return Err(invalid(
                "period_secs",
                format!("{} is not one of {SUPPORTED_PERIODS:?}", self.period_secs),
            ));
        }
        if self.expiration_secs == 0 {
            return Err(invalid("expiration_secs", "must be >= 1"));
        }
        let durations = [
            ("expiration_secs", self.expiration_secs),
            ("cooldown_secs", self.cooldown_secs),
            ("cycle_backoff_secs", self.cycle_backoff_secs),
            ("tracker.grace_secs", self.tracker.grace_secs),
            ("tracker.retry_backoff_secs", self.tracker.retry_backoff_secs),
            ("tracker.call_timeout_secs", self.tracker.call_timeout_secs),
        ];
        for (field, secs) in durations {
            if secs > MAX_DURATION_SECS {
                return Err(invalid(field, format!("must be <= {MAX_DURATION_SECS}")));
            }
        }
        if !(0.0..=100.0).contains(&self.min_payout_percent) {
            return Err(invalid("min_payout_percent", "must be within 0..=100"));
        }
        if !self.martingale.multiplier.is_finite() || self.martingale.multiplier < 1.0 {
            return Err(invalid("martingale.multiplier", "must be >= 1.0"));
        }
        if self.martingale.max_steps > MAX_MARTINGALE_STEPS {
            return Err(invalid(
                "martingale.max_steps",
                format!("must be <= {MAX_MARTINGALE_STEPS}"),
            ));
        }
        if self.martingale.enabled && !self.risk_config().max_stake().is_finite() {
            return Err(invalid(
                "martingale.max_steps",
                "top of the stake ladder is not a finite amount",
            ));
        }
        if self.max_trades_per_pair == 0 {
            return Err(invalid("max_trades_per_pair", "must be >= 1"));
        }
        if self.loss_circuit_breaker_threshold == 0 {
            return Err(invalid("loss_circuit_breaker_threshold", "must be >= 1"));
        }
        if self.min_history == 0 {
            return Err(invalid("min_history", "must be >= 1"));
        }
        if self.history_capacity < self.min_history {
            return Err(invalid(
                "history_capacity",
                format!("must hold at least min_history ({}) candles", self.min_history),
            ));
        }
        if self.confirmation_bars > self.min_history {
            return Err(invalid("confirmation_bars", "cannot exceed min_history"));
        }
        if !self.volatility_filter.min_threshold.is_finite()
            || self.volatility_filter.min_threshold < 0.0
        {
            return Err(invalid("volatility_filter.min_threshold", "must be >= 0"));
        }
        if !self.trend_filter.min_threshold.is_finite() || self.trend_filter.min_threshold < 0.0 {
            return Err(invalid("trend_filter.min_threshold", "must be >= 0"));
        }
        if self.instruments.iter().any(|i| i.trim().is_empty()) {
            return Err(invalid("instruments", "names must not be empty"));
        }
        if self.tracker.call_timeout_secs == 0 {
            return Err(invalid("tracker.call_timeout_secs", "must be >= 1"));
        }
        SignalEvaluator::new(self.evaluator_config())
            .map_err(|e| invalid("strategy", e.to_string()))?;
        Ok(())
    }

    pub fn period(&self) -> Result<Period, ConfigError> {
        Period::from_secs(self.period_secs).map_err(|e| invalid("period_secs", e.to_string()))
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            strategy: self.strategy.clone(),
            min_history: self.min_history,
            confirmation_bars: self.confirmation_bars,
            volatility_filter: self.volatility_filter.clone(),
            trend_filter: self.trend_filter.clone(),
            body_expansion: self.body_expansion,
        }
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            base_stake: self.base_stake,
            martingale: self.martingale.clone(),
            max_trades_per_pair: self.max_trades_per_pair,
            cooldown_secs: self.cooldown_secs,
            loss_circuit_breaker_threshold: self.loss_circuit_breaker_threshold,
        }
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    ///
    /// Two configs with identical settings share a fingerprint, so audit
    /// records can be tied back to the configuration that produced them.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Human-readable one-screen summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let on_off = |b: bool| if b { "on" } else { "off" };
        let _ = writeln!(out, "strategy            {}", self.strategy.id());
        let _ = writeln!(out, "period              {}s", self.period_secs);
        let _ = writeln!(out, "expiration          {}s", self.expiration_secs);
        let _ = writeln!(out, "base stake          {:.2}", self.base_stake);
        let _ = writeln!(out, "min payout          {:.0}%", self.min_payout_percent);
        let _ = writeln!(
            out,
            "martingale          {} (x{}, {} steps, reset on win {})",
            on_off(self.martingale.enabled),
            self.martingale.multiplier,
            self.martingale.max_steps,
            on_off(self.martingale.reset_on_win)
        );
        let _ = writeln!(out, "max trades / pair   {}", self.max_trades_per_pair);
        let _ = writeln!(out, "cooldown            {}s", self.cooldown_secs);
        let _ = writeln!(out, "confirmation bars   {}", self.confirmation_bars);
        let _ = writeln!(
            out,
            "volatility filter   {} (>= {})",
            on_off(self.volatility_filter.enabled),
            self.volatility_filter.min_threshold
        );
        let _ = writeln!(
            out,
            "trend filter        {} (>= {})",
            on_off(self.trend_filter.enabled),
            self.trend_filter.min_threshold
        );
        let _ = writeln!(out, "circuit breaker     {} losses", self.loss_circuit_breaker_threshold);
        let instruments = if self.instruments.is_empty() {
            "all above min payout".to_string()
        } else {
            self.instruments.join(", ")
        };
        let _ = write!(out, "instruments         {instruments}");
        out
    }
}
