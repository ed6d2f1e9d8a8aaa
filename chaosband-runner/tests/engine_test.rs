//! End-to-end tests for the trading engine against a scripted broker.
//!
//! Tests:
//! 1. Ticks → candles → FCB breakout → reservation → placement → settlement,
//!    with one audit event per step.
//! 2. The cooldown gates a repeated signal on the next cycle.
//! 3. Instrument selection honours payout, open flag and allow-list, and
//!    refreshing drops instruments and their history.
//! 4. Fetch failures and short history are counted, never fatal.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chaosband_core::clock::Clock;
use chaosband_core::domain::{Direction, Outcome};
use chaosband_runner::telemetry::{AuditEvent, MemorySink};
use chaosband_runner::{BotConfig, EngineError, TokioClock, TradingEngine};
use chrono::{TimeZone, Utc};
use common::{candle_ticks, t0, zigzag_ticks, ScriptedBroker};

// ── Helpers ──

fn at(h: u32, m: u32, s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
}

struct Harness {
    broker: Arc<ScriptedBroker>,
    sink: Arc<MemorySink>,
    engine: TradingEngine,
}

fn harness(config: BotConfig, broker: impl FnOnce(Arc<dyn Clock>) -> ScriptedBroker) -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::anchored(at(9, 58, 30)));
    let broker = Arc::new(broker(Arc::clone(&clock)));
    let sink = Arc::new(MemorySink::new());
    let engine = TradingEngine::new(config, broker.clone(), clock, sink.clone()).unwrap();
    Harness {
        broker,
        sink,
        engine,
    }
}

fn breakout_broker(clock: Arc<dyn Clock>) -> ScriptedBroker {
    ScriptedBroker::new(clock)
        .with_payout("X", 85.0, true)
        .with_ticks("X", zigzag_ticks("X", 40.0))
}

// ── Full pipeline ──

#[tokio::test(start_paused = true)]
async fn breakout_is_traded_and_settled() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    assert_eq!(h.engine.instruments(), ["X".to_string()]);
    // Candles opening before 09:58 are closed at prepare time.
    assert_eq!(h.engine.book().get("X").unwrap().len(), 58);

    tokio::time::sleep(Duration::from_secs(180)).await;
    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.cycle, 1);
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.signals, 1);
    assert_eq!(report.submitted, 1);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.failures, 0);
    assert_eq!(report.active_trades, 1);
    assert_eq!(h.engine.book().get("X").unwrap().len(), 61);

    let placed = h.broker.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].instrument, "X");
    assert_eq!(placed[0].direction, Direction::Long);
    assert_eq!(placed[0].stake, 100.0);
    assert_eq!(placed[0].expiration_secs, 180);

    let resolved = h.engine.tracker_mut().drain().await;
    assert_eq!(resolved.len(), 1);

    let state = h.engine.risk().snapshot("X").unwrap();
    assert_eq!(state.active_trade_count, 0);
    assert_eq!(state.total_trades, 1);

    assert_eq!(h.sink.count("signal_detected"), 1);
    assert_eq!(h.sink.count("trade_placed"), 1);
    assert_eq!(h.sink.count("trade_resolved"), 1);
}

#[tokio::test(start_paused = true)]
async fn placed_event_records_breakout_features() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    tokio::time::sleep(Duration::from_secs(180)).await;
    h.engine.run_cycle().await.unwrap();

    let placed = h
        .sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            AuditEvent::TradePlaced {
                price, features, at, ..
            } => Some((price, features, at)),
            _ => None,
        })
        .unwrap();
    let (price, features, placed_at) = placed;
    assert_eq!(placed_at, at(10, 1, 30));
    assert_eq!(price, features["close"]);
    assert!(price > features["upper_band"]);
    for key in ["fractal_upper", "fractal_lower", "chaos_osc", "volatility", "trend_strength"] {
        assert!(features.contains_key(key), "missing {key}");
    }
}

#[tokio::test(start_paused = true)]
async fn cooldown_gates_the_next_signal() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    tokio::time::sleep(Duration::from_secs(180)).await;
    h.engine.run_cycle().await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.signals, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.submitted, 0);
    assert_eq!(h.broker.placed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn settled_trades_are_reaped_by_the_next_cycle() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    tokio::time::sleep(Duration::from_secs(180)).await;
    h.engine.run_cycle().await.unwrap();

    // Placed 10:01:30, first poll at 10:04:40.
    tokio::time::sleep(Duration::from_secs(240)).await;
    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(report.active_trades, 0);

    let resolved: Vec<_> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AuditEvent::TradeResolved { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect();
    assert_eq!(resolved, vec![Outcome::Won]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_open_monitors() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    tokio::time::sleep(Duration::from_secs(180)).await;
    h.engine.run_cycle().await.unwrap();

    assert_eq!(h.engine.shutdown(), 1);
    assert_eq!(h.engine.tracker().active_count(), 1);
}

// ── Instrument selection ──

#[tokio::test(start_paused = true)]
async fn selection_filters_payouts() {
    let mut h = harness(BotConfig::default(), |clock| {
        ScriptedBroker::new(clock)
            .with_payout("LOW", 70.0, true)
            .with_payout("SHUT", 90.0, false)
            .with_payout("B", 80.0, true)
            .with_payout("A", 92.0, true)
    });
    h.engine.prepare().await.unwrap();
    assert_eq!(h.engine.instruments(), ["A".to_string(), "B".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn allow_list_narrows_selection() {
    let config = BotConfig {
        instruments: vec!["B".into()],
        ..BotConfig::default()
    };
    let mut h = harness(config, |clock| {
        ScriptedBroker::new(clock)
            .with_payout("A", 92.0, true)
            .with_payout("B", 85.0, true)
    });
    h.engine.prepare().await.unwrap();
    assert_eq!(h.engine.instruments(), ["B".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn nothing_selectable_is_an_error() {
    let mut h = harness(BotConfig::default(), |clock| {
        ScriptedBroker::new(clock).with_payout("LOW", 60.0, true)
    });
    let err = h.engine.prepare().await.unwrap_err();
    assert!(matches!(err, EngineError::NoInstruments { min_payout } if min_payout == 80.0));
}

#[tokio::test(start_paused = true)]
async fn refresh_drops_delisted_instruments() {
    let mut h = harness(BotConfig::default(), |clock| {
        ScriptedBroker::new(clock)
            .with_payout("X", 85.0, true)
            .with_payout("W", 85.0, true)
            .with_ticks("X", zigzag_ticks("X", 40.0))
            .with_ticks("W", zigzag_ticks("W", 0.0))
    });
    h.engine.prepare().await.unwrap();
    assert!(h.engine.book().contains("W"));

    h.broker.remove_payout("W");
    assert_eq!(h.engine.refresh_instruments().await.unwrap(), 1);
    assert_eq!(h.engine.instruments(), ["X".to_string()]);
    assert!(!h.engine.book().contains("W"));
    assert_eq!(h.broker.payout_calls(), 2);
}

// ── Degraded cycles ──

#[tokio::test(start_paused = true)]
async fn cycle_before_prepare_is_refused() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    assert!(matches!(
        h.engine.run_cycle().await,
        Err(EngineError::NotPrepared)
    ));
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_is_counted_not_fatal() {
    let mut h = harness(BotConfig::default(), breakout_broker);
    h.engine.prepare().await.unwrap();
    h.broker.fail_fetch("X");

    tokio::time::sleep(Duration::from_secs(180)).await;
    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.failures, 1);
    assert_eq!(report.evaluated, 0);
    assert!(h.broker.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn short_history_is_skipped() {
    let mut h = harness(BotConfig::default(), |clock| {
        let ticks = (0..10)
            .flat_map(|i| {
                candle_ticks(
                    "S",
                    t0() + chrono::Duration::minutes(50 + i),
                    100.0,
                    101.0,
                    0.5,
                )
            })
            .collect();
        ScriptedBroker::new(clock)
            .with_payout("S", 85.0, true)
            .with_ticks("S", ticks)
    });
    h.engine.prepare().await.unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.evaluated, 0);
    assert_eq!(h.sink.count("signal_detected"), 0);
}
