//! Indicator library.
//!
//! Indicators are pure functions: candle history in, numeric series out. Each
//! output has the same length as its input and is `f64::NAN` during warm-up.
//! Multi-output indicators (Bollinger, MACD, Supertrend, fractals) expose a
//! struct of series or a single latest value instead of the single-series
//! `Indicator` trait.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod chaos;
pub mod cross;
pub mod ema;
pub mod fractals;
pub mod heikin_ashi;
pub mod macd;
pub mod sma;
pub mod supertrend;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::{bollinger_bands, BollingerBands};
pub use chaos::ChaosOscillator;
pub use cross::{crossed_above, crossed_below};
pub use ema::Ema;
pub use fractals::{latest_fractals, FractalLevels};
pub use heikin_ashi::heikin_ashi;
pub use macd::{macd, MacdSeries};
pub use sma::Sma;
pub use supertrend::{supertrend, SupertrendSeries};

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on candles after t. Computing over a
/// truncated series must reproduce the prefix of the full computation.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the whole series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Last value of a series, or `None` when empty or still warming up.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

/// Create synthetic one-minute candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let t0 = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                instrument: "TEST".to_string(),
                open_time: t0 + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
            }
        })
        .collect()
}

/// Create candles from explicit (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let t0 = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            instrument: "TEST".to_string(),
            open_time: t0 + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
