//! Williams fractals: swing highs and lows.
//!
//! Candle i is a fractal high when its high is ≥ every high within `period`
//! candles on both sides (fractal low symmetric on lows). Only candles with a
//! full window on both sides qualify, so the newest `period` candles can never
//! be fractals yet.

use crate::domain::Candle;

/// Most recent confirmed swing levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalLevels {
    pub upper: f64,
    pub lower: f64,
}

/// Latest fractal high and low, or `None` until both exist.
pub fn latest_fractals(candles: &[Candle], period: usize) -> Option<FractalLevels> {
    let n = candles.len();
    if period == 0 || n < 2 * period + 1 {
        return None;
    }

    let mut upper = None;
    let mut lower = None;

    for i in period..n - period {
        let window = (i - period)..=(i + period);
        let is_high = window
            .clone()
            .filter(|&j| j != i)
            .all(|j| candles[i].high >= candles[j].high);
        if is_high {
            upper = Some(candles[i].high);
        }
        let is_low = window
            .filter(|&j| j != i)
            .all(|j| candles[i].low <= candles[j].low);
        if is_low {
            lower = Some(candles[i].low);
        }
    }

    Some(FractalLevels {
        upper: upper?,
        lower: lower?,
    })
}
