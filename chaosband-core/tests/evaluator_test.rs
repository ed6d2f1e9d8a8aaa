//! Integration tests for the signal evaluator.
//!
//! Tests:
//! 1. FCB breakout above the upper band fires long through every default gate.
//! 2. Each gate rejects with its own verdict (momentum, trend, volatility, persistence).
//! 3. Evaluation is deterministic and ignores candles after the slice end.
//! 4. Alternate strategies run through the same gates.

use chaosband_core::aggregate::CandleSeries;
use chaosband_core::domain::{Candle, Direction};
use chaosband_core::signal::{
    EvaluatorConfig, SignalEvaluator, SmaCrossParams, StrategyConfig, Verdict,
};
use chrono::{Duration, TimeZone, Utc};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn candle(i: usize, open: f64, close: f64, wick: f64) -> Candle {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
    Candle {
        instrument: "EURUSD".into(),
        open_time: t0 + Duration::minutes(i as i64),
        open,
        high: open.max(close) + wick,
        low: open.min(close) - wick,
        close,
    }
}

/// Sixty candles of a zig-zag uptrend: five steps up by 1.0, three down by 1.2.
fn zigzag() -> Vec<Candle> {
    let mut candles = Vec::new();
    let mut price = 100.0;
    for i in 0..60 {
        let step = if i % 8 < 5 { 1.0 } else { -1.2 };
        let open = price;
        price += step;
        candles.push(candle(i, open, price, 0.3));
    }
    candles
}

fn with_thrust(mut candles: Vec<Candle>, delta: f64) -> Vec<Candle> {
    let last = candles.last().unwrap().close;
    let i = candles.len();
    candles.push(candle(i, last, last + delta, 0.3));
    candles
}

/// Candles whose open is the previous close and whose wicks extend 1.0.
fn from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            candle(i, open, close, 1.0)
        })
        .collect()
}

fn evaluator(config: EvaluatorConfig) -> SignalEvaluator {
    SignalEvaluator::new(config).unwrap()
}

// ──────────────────────────────────────────────
// FCB pipeline
// ──────────────────────────────────────────────

#[test]
fn upward_breakout_fires_long() {
    let candles = with_thrust(zigzag(), 40.0);
    let signal = evaluator(EvaluatorConfig::default()).evaluate_candles("EURUSD", &candles);

    assert_eq!(signal.verdict, Verdict::Fired);
    assert_eq!(signal.direction, Direction::Long);
    assert!(signal.is_actionable());
    assert_eq!(signal.features["confirmations"], 2.0);
    assert!(signal.features["trend_strength"] >= 25.0);
    assert!(signal.features["volatility"] > 0.0001);
    assert!(signal.features["close"] > signal.features["upper_band"]);
}

#[test]
fn series_and_slice_evaluate_identically() {
    let candles = with_thrust(zigzag(), 40.0);
    let mut series = CandleSeries::new("EURUSD", 200);
    series.merge(candles.clone(), candles.last().unwrap().open_time + Duration::minutes(1));

    let e = evaluator(EvaluatorConfig::default());
    assert_eq!(e.evaluate(&series), e.evaluate_candles("EURUSD", &candles));
}

#[test]
fn evaluation_is_deterministic() {
    let candles = with_thrust(zigzag(), 40.0);
    let e = evaluator(EvaluatorConfig::default());
    assert_eq!(
        e.evaluate_candles("EURUSD", &candles),
        e.evaluate_candles("EURUSD", &candles)
    );
}

#[test]
fn close_inside_bands_has_no_candidate() {
    let signal = evaluator(EvaluatorConfig::default()).evaluate_candles("EURUSD", &zigzag());
    assert_eq!(signal.verdict, Verdict::NoCandidate);
    assert_eq!(signal.direction, Direction::Flat);
    assert!(signal.features.contains_key("chaos_osc"));
}

#[test]
fn downward_break_against_positive_momentum_is_rejected() {
    let candles = with_thrust(zigzag(), -40.0);
    let signal = evaluator(EvaluatorConfig::default()).evaluate_candles("EURUSD", &candles);
    assert_eq!(signal.verdict, Verdict::MomentumMismatch);
    assert_eq!(signal.direction, Direction::Flat);
}

#[test]
fn weak_trend_is_rejected() {
    let mut config = EvaluatorConfig::default();
    config.trend_filter.min_threshold = 90.0;
    let signal = evaluator(config).evaluate_candles("EURUSD", &with_thrust(zigzag(), 40.0));
    assert_eq!(signal.verdict, Verdict::TrendTooWeak);
}

#[test]
fn disabled_trend_filter_is_skipped() {
    let mut config = EvaluatorConfig::default();
    config.trend_filter.enabled = false;
    config.trend_filter.min_threshold = 90.0;
    let signal = evaluator(config).evaluate_candles("EURUSD", &with_thrust(zigzag(), 40.0));
    assert_eq!(signal.verdict, Verdict::Fired);
}

#[test]
fn low_volatility_is_rejected() {
    let mut config = EvaluatorConfig::default();
    config.volatility_filter.min_threshold = 1.0;
    let signal = evaluator(config).evaluate_candles("EURUSD", &with_thrust(zigzag(), 40.0));
    assert_eq!(signal.verdict, Verdict::VolatilityTooLow);
}

#[test]
fn insufficient_persistence_is_rejected() {
    let mut config = EvaluatorConfig::default();
    config.confirmation_bars = 3;
    let signal = evaluator(config).evaluate_candles("EURUSD", &with_thrust(zigzag(), 40.0));
    assert_eq!(
        signal.verdict,
        Verdict::NotConfirmed {
            confirmations: 2,
            required: 3
        }
    );
    assert_eq!(signal.direction, Direction::Flat);
}

#[test]
fn expanding_body_passes_body_gate() {
    let mut config = EvaluatorConfig::default();
    config.body_expansion = true;
    let signal = evaluator(config).evaluate_candles("EURUSD", &with_thrust(zigzag(), 40.0));
    assert_eq!(signal.verdict, Verdict::Fired);
}

#[test]
fn short_history_reports_missing_feature() {
    let config = EvaluatorConfig {
        min_history: 20,
        ..EvaluatorConfig::default()
    };
    let signal = evaluator(config).evaluate_candles("EURUSD", &zigzag()[..20]);
    assert_eq!(signal.verdict, Verdict::FeatureUnavailable("chaos_osc".into()));
}

#[test]
fn below_min_history_is_rejected() {
    let signal = evaluator(EvaluatorConfig::default()).evaluate_candles("EURUSD", &zigzag()[..30]);
    assert_eq!(
        signal.verdict,
        Verdict::InsufficientHistory { have: 30, need: 50 }
    );
}

// ──────────────────────────────────────────────
// Alternate strategies
// ──────────────────────────────────────────────

#[test]
fn sma_cross_fires_on_v_bottom() {
    let mut closes: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
    let base = *closes.last().unwrap();
    for k in 1..=6 {
        closes.push(base + 3.0 * k as f64);
    }

    let mut config = EvaluatorConfig {
        strategy: StrategyConfig::SmaCross(SmaCrossParams::default()),
        min_history: 20,
        ..EvaluatorConfig::default()
    };
    config.trend_filter.enabled = false;
    config.volatility_filter.enabled = false;

    let e = evaluator(config);
    assert_eq!(e.strategy(), "sma_cross");
    let signal = e.evaluate_candles("EURUSD", &from_closes(&closes));
    assert_eq!(signal.verdict, Verdict::Fired);
    assert_eq!(signal.direction, Direction::Long);
    assert!(!signal.features.contains_key("confirmations"));
}

#[test]
fn invalid_strategy_parameters_fail_construction() {
    let config = EvaluatorConfig {
        strategy: StrategyConfig::SmaCross(SmaCrossParams {
            fast: 0,
            ..SmaCrossParams::default()
        }),
        ..EvaluatorConfig::default()
    };
    assert!(SignalEvaluator::new(config).is_err());
}
