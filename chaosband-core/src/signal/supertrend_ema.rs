//! Heikin-Ashi Supertrend crossing a fast EMA, inside an EMA regime.
//!
//! Long: Supertrend trending up, fast EMA above slow EMA, and the Supertrend
//! band crossed above the fast EMA on the latest candle. Short mirrors it.

use super::config::SupertrendEmaParams;
use super::{Candidate, CandidateRule, Features};
use crate::domain::{Candle, Direction};
use crate::indicators::ema::ema_of_series;
use crate::indicators::{crossed_above, crossed_below, heikin_ashi, supertrend};

#[derive(Debug, Clone)]
pub struct SupertrendEmaRule {
    params: SupertrendEmaParams,
}

impl SupertrendEmaRule {
    pub fn new(params: SupertrendEmaParams) -> Self {
        assert!(params.supertrend_period >= 1, "supertrend period must be >= 1");
        assert!(
            params.fast_ema >= 1 && params.slow_ema >= 1,
            "EMA periods must be >= 1"
        );
        Self { params }
    }
}

impl CandidateRule for SupertrendEmaRule {
    fn name(&self) -> &str {
        "supertrend_ema"
    }

    fn warmup_candles(&self) -> usize {
        self.params
            .slow_ema
            .max(self.params.fast_ema + 1)
            .max(self.params.supertrend_period + 2)
    }

    fn candidate(&self, candles: &[Candle]) -> Candidate {
        let mut features = Features::new();
        if candles.len() < 2 {
            return Candidate::unavailable("supertrend", features);
        }

        let ha = heikin_ashi(candles);
        let closes: Vec<f64> = ha.iter().map(|c| c.close).collect();
        let st = supertrend(
            &ha,
            self.params.supertrend_period,
            self.params.supertrend_multiplier,
        );
        let fast = ema_of_series(&closes, self.params.fast_ema);
        let slow = ema_of_series(&closes, self.params.slow_ema);

        let i = candles.len() - 1;
        let Some(up) = st.up[i] else {
            return Candidate::unavailable("supertrend", features);
        };
        if fast[i].is_nan() || fast[i - 1].is_nan() {
            return Candidate::unavailable("ema_fast", features);
        }
        if slow[i].is_nan() {
            return Candidate::unavailable("ema_slow", features);
        }

        features.insert("supertrend".into(), st.band[i]);
        features.insert("ema_fast".into(), fast[i]);
        features.insert("ema_slow".into(), slow[i]);

        if up && fast[i] > slow[i] && crossed_above(&st.band, &fast, i) {
            Candidate::toward(Direction::Long, features)
        } else if !up && fast[i] < slow[i] && crossed_below(&st.band, &fast, i) {
            Candidate::toward(Direction::Short, features)
        } else {
            Candidate::none(features)
        }
    }
}
