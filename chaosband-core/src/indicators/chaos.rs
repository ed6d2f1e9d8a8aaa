//! Bill Williams momentum oscillators.
//!
//! - Awesome Oscillator: AO = SMA(hl2, 5) - SMA(hl2, 34)
//! - Accelerator Oscillator: AC = AO - SMA(AO, 5)
//! - Chaos oscillator: AO - AC, which reduces to SMA(AO, 5)
//!
//! Lookback: 33 for AO, 37 for AC and chaos.

use super::sma::sma_of_series;
use super::Indicator;
use crate::domain::Candle;

const FAST: usize = 5;
const SLOW: usize = 34;
const SIGNAL: usize = 5;

pub fn awesome_oscillator(candles: &[Candle]) -> Vec<f64> {
    let hl2: Vec<f64> = candles.iter().map(Candle::hl2).collect();
    let fast = sma_of_series(&hl2, FAST);
    let slow = sma_of_series(&hl2, SLOW);
    fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
}

pub fn accelerator_oscillator(candles: &[Candle]) -> Vec<f64> {
    let ao = awesome_oscillator(candles);
    let ao_signal = sma_of_series(&ao, SIGNAL);
    ao.iter().zip(&ao_signal).map(|(a, s)| a - s).collect()
}

#[derive(Debug, Clone)]
pub struct ChaosOscillator {
    name: String,
}

impl ChaosOscillator {
    pub fn new() -> Self {
        Self {
            name: "chaos_osc".to_string(),
        }
    }
}

impl Default for ChaosOscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for ChaosOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        SLOW + SIGNAL - 2
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let ao = awesome_oscillator(candles);
        let ac = accelerator_oscillator(candles);
        ao.iter().zip(&ac).map(|(a, c)| a - c).collect()
    }
}
