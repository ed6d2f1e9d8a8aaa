//! Factory — converts a `StrategyConfig` into a runtime candidate rule.

use super::config::StrategyConfig;
use super::{BollingerMacdRule, CandidateRule, FractalChaosBands, SmaCrossRule, SupertrendEmaRule};

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur while building a strategy pipeline.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FactoryError {
    #[error("strategy {strategy}: parameter {param} {reason}")]
    InvalidParam {
        strategy: &'static str,
        param: &'static str,
        reason: &'static str,
    },
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn require_period(
    strategy: &'static str,
    param: &'static str,
    value: usize,
) -> Result<(), FactoryError> {
    if value == 0 {
        return Err(FactoryError::InvalidParam {
            strategy,
            param,
            reason: "must be >= 1",
        });
    }
    Ok(())
}

fn require_positive(
    strategy: &'static str,
    param: &'static str,
    value: f64,
) -> Result<(), FactoryError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(FactoryError::InvalidParam {
            strategy,
            param,
            reason: "must be a positive number",
        });
    }
    Ok(())
}

// ─── Rule factory ────────────────────────────────────────────────────

/// Validate parameters and build the candidate rule for a strategy.
pub fn create_rule(config: &StrategyConfig) -> Result<Box<dyn CandidateRule>, FactoryError> {
    let id = config.id();
    match config {
        StrategyConfig::Fcb(p) => {
            require_period(id, "fractal_period", p.fractal_period)?;
            require_period(id, "atr_period", p.atr_period)?;
            require_positive(id, "band_multiplier", p.band_multiplier)?;
            if !(p.volatility_scale.is_finite() && p.volatility_scale >= 0.0) {
                return Err(FactoryError::InvalidParam {
                    strategy: id,
                    param: "volatility_scale",
                    reason: "must be >= 0",
                });
            }
            Ok(Box::new(FractalChaosBands::new(p.clone())))
        }
        StrategyConfig::SupertrendEma(p) => {
            require_period(id, "supertrend_period", p.supertrend_period)?;
            require_positive(id, "supertrend_multiplier", p.supertrend_multiplier)?;
            require_period(id, "fast_ema", p.fast_ema)?;
            require_period(id, "slow_ema", p.slow_ema)?;
            Ok(Box::new(SupertrendEmaRule::new(p.clone())))
        }
        StrategyConfig::SmaCross(p) => {
            require_period(id, "fast", p.fast)?;
            require_period(id, "mid", p.mid)?;
            require_period(id, "slow", p.slow)?;
            Ok(Box::new(SmaCrossRule::new(p.clone())))
        }
        StrategyConfig::BollingerMacd(p) => {
            require_period(id, "bb_period", p.bb_period)?;
            require_positive(id, "bb_stds", p.bb_stds)?;
            require_period(id, "macd_fast", p.macd_fast)?;
            require_period(id, "macd_slow", p.macd_slow)?;
            require_period(id, "macd_signal", p.macd_signal)?;
            require_period(id, "cross_window", p.cross_window)?;
            Ok(Box::new(BollingerMacdRule::new(p.clone())))
        }
    }
}
