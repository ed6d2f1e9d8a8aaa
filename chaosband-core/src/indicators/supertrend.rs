//! Supertrend — ATR-based directional indicator.
//!
//! Inherently sequential: direction flips between support and resistance
//! based on close vs band comparisons.
//!
//! Output: the active band (lower band while trending up, upper band while
//! trending down) and the direction per candle.
//! Lookback: period.

use super::atr::{true_range, wilder_smooth};
use crate::domain::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendSeries {
    pub band: Vec<f64>,
    /// `Some(true)` trending up, `Some(false)` trending down, `None` during warm-up.
    pub up: Vec<Option<bool>>,
}

pub fn supertrend(candles: &[Candle], period: usize, multiplier: f64) -> SupertrendSeries {
    let n = candles.len();
    let mut out = SupertrendSeries {
        band: vec![f64::NAN; n],
        up: vec![None; n],
    };

    let mut tr = true_range(candles);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    let atr = wilder_smooth(&tr, period);

    let start = match atr.iter().position(|v| !v.is_nan()) {
        Some(idx) => idx,
        None => return out,
    };

    let hl2 = candles[start].hl2();
    let mut upper_band = hl2 + multiplier * atr[start];
    let mut lower_band = hl2 - multiplier * atr[start];
    let mut trending_up = true;
    out.band[start] = lower_band;
    out.up[start] = Some(true);

    for i in (start + 1)..n {
        if atr[i].is_nan() || candles[i].close.is_nan() {
            break;
        }

        let hl2 = candles[i].hl2();
        let basic_upper = hl2 + multiplier * atr[i];
        let basic_lower = hl2 - multiplier * atr[i];

        // Upper band only tightens while price stays below it; lower band symmetric.
        let prev_close = candles[i - 1].close;
        upper_band = if prev_close <= upper_band {
            basic_upper.min(upper_band)
        } else {
            basic_upper
        };
        lower_band = if prev_close >= lower_band {
            basic_lower.max(lower_band)
        } else {
            basic_lower
        };

        if trending_up && candles[i].close < lower_band {
            trending_up = false;
        } else if !trending_up && candles[i].close > upper_band {
            trending_up = true;
        }

        out.band[i] = if trending_up { lower_band } else { upper_band };
        out.up[i] = Some(trending_up);
    }

    out
}
