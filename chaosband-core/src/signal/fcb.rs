//! Fractal Chaos Bands breakout.
//!
//! Bands start from the latest fractal swing high/low and are pushed outward
//! by `(upper - lower) × band_multiplier × (ATR / close) × volatility_scale`.
//! A close beyond a band is a candidate; the chaos oscillator supplies the
//! momentum reading and the raw fractal levels are the persistence levels.

use super::config::FcbParams;
use super::{BreakoutLevels, Candidate, CandidateRule, Features};
use crate::domain::{Candle, Direction};
use crate::indicators::{last_valid, latest_fractals, Atr, ChaosOscillator, Indicator};

#[derive(Debug, Clone)]
pub struct FractalChaosBands {
    params: FcbParams,
    atr: Atr,
    chaos: ChaosOscillator,
}

impl FractalChaosBands {
    pub fn new(params: FcbParams) -> Self {
        assert!(params.fractal_period >= 1, "fractal period must be >= 1");
        let atr = Atr::new(params.atr_period);
        Self {
            params,
            atr,
            chaos: ChaosOscillator::new(),
        }
    }
}

impl CandidateRule for FractalChaosBands {
    fn name(&self) -> &str {
        "fcb"
    }

    fn warmup_candles(&self) -> usize {
        (2 * self.params.fractal_period + 1)
            .max(self.chaos.lookback() + 1)
            .max(self.atr.lookback() + 1)
    }

    fn candidate(&self, candles: &[Candle]) -> Candidate {
        let mut features = Features::new();

        let Some(fractals) = latest_fractals(candles, self.params.fractal_period) else {
            return Candidate::unavailable("fractals", features);
        };
        features.insert("fractal_upper".into(), fractals.upper);
        features.insert("fractal_lower".into(), fractals.lower);

        let Some(chaos) = last_valid(&self.chaos.compute(candles)) else {
            return Candidate::unavailable("chaos_osc", features);
        };
        features.insert("chaos_osc".into(), chaos);

        let Some(atr) = last_valid(&self.atr.compute(candles)) else {
            return Candidate::unavailable("atr", features);
        };
        let close = candles.last().map(|c| c.close).unwrap_or(f64::NAN);
        let volatility = if close > 0.0 { atr / close } else { 0.0 };

        let band_width = (fractals.upper - fractals.lower) * self.params.band_multiplier;
        let push = band_width * volatility * self.params.volatility_scale;
        let upper_band = fractals.upper + push;
        let lower_band = fractals.lower - push;
        features.insert("upper_band".into(), upper_band);
        features.insert("lower_band".into(), lower_band);

        let direction = if close > upper_band {
            Direction::Long
        } else if close < lower_band {
            Direction::Short
        } else {
            Direction::Flat
        };

        Candidate {
            direction,
            momentum: Some(chaos),
            levels: Some(BreakoutLevels {
                upper: fractals.upper,
                lower: fractals.lower,
            }),
            features,
            unavailable: None,
        }
    }
}
