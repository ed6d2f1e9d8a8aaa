//! MACD — difference of two EMAs, its EMA signal line, and the histogram.

use super::ema::ema_of_series;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema_of_series(values, fast);
    let slow_ema = ema_of_series(values, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema_of_series(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();
    MacdSeries {
        line,
        signal: signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn warmup_lengths() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let m = macd(&values, 6, 19, 6);
        assert_eq!(m.line.iter().position(|v| !v.is_nan()), Some(18));
        assert_eq!(m.signal.iter().position(|v| !v.is_nan()), Some(23));
        assert_eq!(m.histogram.iter().position(|v| !v.is_nan()), Some(23));
    }

    #[test]
    fn constant_series_is_zero() {
        let m = macd(&[5.0; 40], 6, 19, 6);
        assert_approx(*m.line.last().unwrap(), 0.0, DEFAULT_EPSILON);
        assert_approx(*m.histogram.last().unwrap(), 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rising_series_has_positive_line() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        assert!(*macd(&values, 6, 19, 6).line.last().unwrap() > 0.0);
    }
}
