//! Signal evaluation — candles in, a directional decision plus audit features out.
//!
//! A `CandidateRule` (one per strategy pipeline) proposes a breakout or
//! crossover direction. The `SignalEvaluator` then applies the shared
//! confirmation gates (momentum sign, trend strength, volatility, body
//! expansion, breakout persistence) and records a `Verdict` naming the first
//! gate that rejected the candidate.

pub mod bollinger_macd;
pub mod config;
pub mod evaluator;
pub mod factory;
pub mod fcb;
pub mod sma_cross;
pub mod supertrend_ema;

pub use bollinger_macd::BollingerMacdRule;
pub use config::{
    BollingerMacdParams, EvaluatorConfig, FcbParams, SmaCrossParams, StrategyConfig,
    SupertrendEmaParams, TrendFilter, VolatilityFilter,
};
pub use evaluator::SignalEvaluator;
pub use factory::{create_rule, FactoryError};
pub use fcb::FractalChaosBands;
pub use sma_cross::SmaCrossRule;
pub use supertrend_ema::SupertrendEmaRule;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Candle, Direction};

/// Named feature values recorded for audit, ordered by name.
pub type Features = BTreeMap<String, f64>;

/// Why an evaluation did or did not produce a trade direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Fired,
    InsufficientHistory { have: usize, need: usize },
    FeatureUnavailable(String),
    NoCandidate,
    MomentumMismatch,
    TrendTooWeak,
    VolatilityTooLow,
    BodyNotExpanding,
    NotConfirmed { confirmations: usize, required: usize },
}

impl Verdict {
    pub fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}

/// Result of one evaluation for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    pub features: Features,
    pub verdict: Verdict,
}

impl Signal {
    pub fn fired(instrument: impl Into<String>, direction: Direction, features: Features) -> Self {
        Self {
            instrument: instrument.into(),
            direction,
            features,
            verdict: Verdict::Fired,
        }
    }

    pub fn rejected(instrument: impl Into<String>, verdict: Verdict, features: Features) -> Self {
        Self {
            instrument: instrument.into(),
            direction: Direction::Flat,
            features,
            verdict,
        }
    }

    /// True when the evaluation produced a long or short decision.
    pub fn is_actionable(&self) -> bool {
        self.verdict.is_fired() && !self.direction.is_flat()
    }
}

/// Raw levels a breakout must persist beyond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakoutLevels {
    pub upper: f64,
    pub lower: f64,
}

/// What a strategy pipeline proposes before the shared gates run.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// `Flat` when the pipeline sees nothing.
    pub direction: Direction,
    /// Momentum reading whose sign must agree with the direction.
    pub momentum: Option<f64>,
    /// Levels recent closes must stay beyond for the breakout to count.
    pub levels: Option<BreakoutLevels>,
    pub features: Features,
    /// Name of a feature that could not be computed from the candles.
    pub unavailable: Option<String>,
}

impl Candidate {
    pub fn none(features: Features) -> Self {
        Self {
            direction: Direction::Flat,
            momentum: None,
            levels: None,
            features,
            unavailable: None,
        }
    }

    pub fn unavailable(feature: &str, features: Features) -> Self {
        Self {
            unavailable: Some(feature.to_string()),
            ..Self::none(features)
        }
    }

    pub fn toward(direction: Direction, features: Features) -> Self {
        Self {
            direction,
            ..Self::none(features)
        }
    }
}

/// A strategy pipeline's candidate rule.
///
/// # Architecture invariant
/// Rules see only the candle slice: no risk state, no broker, no clock.
pub trait CandidateRule: Send + Sync {
    /// Strategy id (e.g., "fcb").
    fn name(&self) -> &str;

    /// Candles needed before the rule can produce a candidate.
    fn warmup_candles(&self) -> usize;

    fn candidate(&self, candles: &[Candle]) -> Candidate;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_signal_is_flat() {
        let s = Signal::rejected("X", Verdict::NoCandidate, Features::new());
        assert_eq!(s.direction, Direction::Flat);
        assert!(!s.is_actionable());
    }

    #[test]
    fn verdict_serializes_snake_case() {
        let json = serde_json::to_string(&Verdict::TrendTooWeak).unwrap();
        assert_eq!(json, "\"trend_too_weak\"");
        let json = serde_json::to_string(&Verdict::NotConfirmed {
            confirmations: 1,
            required: 2,
        })
        .unwrap();
        assert!(json.contains("not_confirmed"));
    }

    #[test]
    fn candidate_constructors() {
        let c = Candidate::unavailable("fractals", Features::new());
        assert_eq!(c.direction, Direction::Flat);
        assert_eq!(c.unavailable.as_deref(), Some("fractals"));
        let c = Candidate::toward(Direction::Short, Features::new());
        assert_eq!(c.direction, Direction::Short);
        assert!(c.momentum.is_none());
    }
}
