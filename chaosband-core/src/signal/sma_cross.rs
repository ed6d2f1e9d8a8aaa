//! Triple SMA crossover.
//!
//! Long: the mid SMA crosses above the slow SMA on the latest candle and the
//! fast SMA crossed above the slow SMA on the latest or the previous candle.
//! Short mirrors it.

use super::config::SmaCrossParams;
use super::{Candidate, CandidateRule, Features};
use crate::domain::{Candle, Direction};
use crate::indicators::sma::sma_of_series;
use crate::indicators::{crossed_above, crossed_below};

#[derive(Debug, Clone)]
pub struct SmaCrossRule {
    params: SmaCrossParams,
}

impl SmaCrossRule {
    pub fn new(params: SmaCrossParams) -> Self {
        assert!(
            params.fast >= 1 && params.mid >= 1 && params.slow >= 1,
            "SMA periods must be >= 1"
        );
        Self { params }
    }
}

impl CandidateRule for SmaCrossRule {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn warmup_candles(&self) -> usize {
        self.params.slow.max(self.params.mid).max(self.params.fast) + 2
    }

    fn candidate(&self, candles: &[Candle]) -> Candidate {
        let mut features = Features::new();
        if candles.len() < self.warmup_candles() {
            return Candidate::unavailable("sma_slow", features);
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let fast = sma_of_series(&closes, self.params.fast);
        let mid = sma_of_series(&closes, self.params.mid);
        let slow = sma_of_series(&closes, self.params.slow);

        let i = closes.len() - 1;
        features.insert("sma_fast".into(), fast[i]);
        features.insert("sma_mid".into(), mid[i]);
        features.insert("sma_slow".into(), slow[i]);

        let fast_up = crossed_above(&fast, &slow, i) || crossed_above(&fast, &slow, i - 1);
        let fast_down = crossed_below(&fast, &slow, i) || crossed_below(&fast, &slow, i - 1);

        if crossed_above(&mid, &slow, i) && fast_up {
            Candidate::toward(Direction::Long, features)
        } else if crossed_below(&mid, &slow, i) && fast_down {
            Candidate::toward(Direction::Short, features)
        } else {
            Candidate::none(features)
        }
    }
}
