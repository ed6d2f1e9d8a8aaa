//! Heikin-Ashi Bollinger breakout with MACD confirmation.
//!
//! Long: the Heikin-Ashi close is above the upper Bollinger band (typical
//! price), and within the last `cross_window` candles the MACD line crossed
//! above its signal line and the histogram crossed above zero. Short mirrors it.

use super::config::BollingerMacdParams;
use super::{Candidate, CandidateRule, Features};
use crate::domain::{Candle, Direction};
use crate::indicators::{bollinger_bands, crossed_above, crossed_below, heikin_ashi, macd};

#[derive(Debug, Clone)]
pub struct BollingerMacdRule {
    params: BollingerMacdParams,
}

impl BollingerMacdRule {
    pub fn new(params: BollingerMacdParams) -> Self {
        assert!(params.bb_period >= 1, "Bollinger period must be >= 1");
        assert!(params.cross_window >= 1, "cross window must be >= 1");
        Self { params }
    }

    fn any_within(&self, i: usize, crossed: impl Fn(usize) -> bool) -> bool {
        (0..self.params.cross_window)
            .filter_map(|back| i.checked_sub(back))
            .any(crossed)
    }
}

impl CandidateRule for BollingerMacdRule {
    fn name(&self) -> &str {
        "bollinger_macd"
    }

    fn warmup_candles(&self) -> usize {
        let p = &self.params;
        (p.macd_slow + p.macd_signal - 1).max(p.bb_period) + p.cross_window
    }

    fn candidate(&self, candles: &[Candle]) -> Candidate {
        let mut features = Features::new();
        if candles.len() < self.warmup_candles() {
            return Candidate::unavailable("macd", features);
        }

        let p = &self.params;
        let ha = heikin_ashi(candles);
        let closes: Vec<f64> = ha.iter().map(|c| c.close).collect();
        let typical: Vec<f64> = ha.iter().map(Candle::typical).collect();
        let bb = bollinger_bands(&typical, p.bb_period, p.bb_stds);
        let m = macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let zero = vec![0.0; closes.len()];

        let i = closes.len() - 1;
        let close = closes[i];
        features.insert("ha_close".into(), close);
        features.insert("bb_upper".into(), bb.upper[i]);
        features.insert("bb_lower".into(), bb.lower[i]);
        features.insert("macd".into(), m.line[i]);
        features.insert("macd_signal".into(), m.signal[i]);
        features.insert("macd_hist".into(), m.histogram[i]);

        let macd_up = self.any_within(i, |j| crossed_above(&m.line, &m.signal, j));
        let hist_up = self.any_within(i, |j| crossed_above(&m.histogram, &zero, j));
        let macd_down = self.any_within(i, |j| crossed_below(&m.line, &m.signal, j));
        let hist_down = self.any_within(i, |j| crossed_below(&m.histogram, &zero, j));

        if close > bb.upper[i] && macd_up && hist_up {
            Candidate::toward(Direction::Long, features)
        } else if close < bb.lower[i] && macd_down && hist_down {
            Candidate::toward(Direction::Short, features)
        } else {
            Candidate::none(features)
        }
    }
}
