//! Integration tests for the period-aligned scheduler.
//!
//! Tests:
//! 1. Cycles run once per boundary until shutdown, with periodic refreshes.
//! 2. Failing and panicking cycles are counted and the loop keeps going.
//! 3. Shutdown before the first boundary runs nothing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chaosband_core::clock::{Clock, Period};
use chaosband_runner::telemetry::MemorySink;
use chaosband_runner::{BotConfig, Scheduler, SchedulerStats, TokioClock, TradingEngine};
use chrono::{TimeZone, Utc};
use common::{zigzag_ticks, ScriptedBroker};

// ── Helpers ──

fn setup() -> (Arc<dyn Clock>, Arc<ScriptedBroker>, TradingEngine) {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::anchored(
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 58, 30).unwrap(),
    ));
    let broker = Arc::new(
        ScriptedBroker::new(Arc::clone(&clock))
            .with_payout("X", 85.0, true)
            .with_ticks("X", zigzag_ticks("X", 40.0)),
    );
    let engine = TradingEngine::new(
        BotConfig::default(),
        broker.clone(),
        Arc::clone(&clock),
        Arc::new(MemorySink::new()),
    )
    .unwrap();
    (clock, broker, engine)
}

fn scheduler(clock: Arc<dyn Clock>, refresh_every: u64) -> Scheduler {
    Scheduler::new(Period::from_secs(60).unwrap(), clock)
        .with_refresh_every(refresh_every)
        .with_backoff(Duration::from_secs(5))
}

fn after(secs: u64) -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_secs(secs))
}

// ── Tests ──

#[tokio::test(start_paused = true)]
async fn runs_one_cycle_per_boundary() {
    let (clock, broker, mut engine) = setup();
    engine.prepare().await.unwrap();

    // 09:58:30 + 185s: boundaries 09:59, 10:00 and 10:01.
    let stats = scheduler(clock, 2).run(&mut engine, after(185)).await;
    assert_eq!(
        stats,
        SchedulerStats {
            cycles: 3,
            failed_cycles: 0,
            refreshes: 1,
        }
    );
    assert_eq!(engine.cycles(), 3);
    // prepare plus one refresh.
    assert_eq!(broker.payout_calls(), 2);
    // The breakout fires by 10:01; the cooldown allows one placement.
    assert_eq!(broker.placed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_cycles_back_off_and_continue() {
    let (clock, _broker, mut engine) = setup();
    // Never prepared: every cycle fails.
    let stats = scheduler(clock, 0).run(&mut engine, after(185)).await;
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed_cycles, 3);
    assert_eq!(stats.refreshes, 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_cycles_are_contained() {
    let (clock, broker, mut engine) = setup();
    engine.prepare().await.unwrap();
    broker.panic_on_fetch();

    let stats = scheduler(clock, 0).run(&mut engine, after(185)).await;
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed_cycles, 3);
    assert!(broker.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_boundary_runs_nothing() {
    let (clock, _broker, mut engine) = setup();
    engine.prepare().await.unwrap();

    let stats = scheduler(clock, 1).run(&mut engine, after(10)).await;
    assert_eq!(stats, SchedulerStats::default());
    assert_eq!(engine.cycles(), 0);
}

#[tokio::test(start_paused = true)]
async fn built_from_config() {
    let (clock, _broker, mut engine) = setup();
    engine.prepare().await.unwrap();
    let config = BotConfig {
        period_secs: 120,
        ..BotConfig::default()
    };

    // 2-minute boundaries: 10:00 only.
    let stats = Scheduler::from_config(&config, clock)
        .unwrap()
        .run(&mut engine, after(185))
        .await;
    assert_eq!(stats.cycles, 1);
}
