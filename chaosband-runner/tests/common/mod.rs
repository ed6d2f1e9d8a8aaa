//! Shared fixtures for runner integration tests: a scripted broker and
//! candle-shaped tick builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chaosband_core::clock::{Clock, Period};
use chaosband_core::domain::{Direction, Tick, TradeId};
use chaosband_core::risk::{Reservation, RiskConfig, RiskManager};
use chaosband_runner::broker::{Broker, GatewayError, OrderRequest, Payout, PollOutcome};
use chaosband_runner::tracker::OrderIntent;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

// ── Tick builders ──

/// Four ticks that aggregate into one candle: open, high, low, close.
pub fn candle_ticks(
    instrument: &str,
    open_time: DateTime<Utc>,
    open: f64,
    close: f64,
    wick: f64,
) -> Vec<Tick> {
    vec![
        Tick::new(instrument, open_time, open),
        Tick::new(instrument, open_time + Duration::seconds(15), open.max(close) + wick),
        Tick::new(instrument, open_time + Duration::seconds(30), open.min(close) - wick),
        Tick::new(instrument, open_time + Duration::seconds(45), close),
    ]
}

/// One-minute candles from `t0`: a zig-zag uptrend of sixty candles, five
/// steps up by 1.0 and three down by 1.2, then one candle moving by `thrust`.
pub fn zigzag_ticks(instrument: &str, thrust: f64) -> Vec<Tick> {
    let mut ticks = Vec::new();
    let mut price = 100.0;
    for i in 0..60 {
        let step = if i % 8 < 5 { 1.0 } else { -1.2 };
        let open = price;
        price += step;
        ticks.extend(candle_ticks(
            instrument,
            t0() + Duration::minutes(i),
            open,
            price,
            0.3,
        ));
    }
    ticks.extend(candle_ticks(
        instrument,
        t0() + Duration::minutes(60),
        price,
        price + thrust,
        0.3,
    ));
    ticks
}

// ── Scripted broker ──

#[derive(Default)]
struct Script {
    connected: bool,
    payouts: Vec<Payout>,
    ticks: HashMap<String, Vec<Tick>>,
    place_results: VecDeque<Result<TradeId, GatewayError>>,
    polls: VecDeque<Result<PollOutcome, GatewayError>>,
    default_poll: Option<PollOutcome>,
    panic_on_poll: bool,
    panic_on_fetch: bool,
    failing_fetch: Vec<String>,
    placed: Vec<OrderRequest>,
    next_id: u64,
    poll_calls: u32,
    fetch_calls: u32,
    payout_calls: u32,
}

/// Broker double driven by a script.
///
/// Only ticks at or before the clock's current time are returned. Placement
/// results and poll answers are consumed in order; once the placement
/// script is exhausted orders succeed as `T-1`, `T-2`, ..., and once the
/// poll script is exhausted every poll answers the default (`Won`).
pub struct ScriptedBroker {
    clock: Arc<dyn Clock>,
    script: Mutex<Script>,
}

impl ScriptedBroker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            script: Mutex::new(Script {
                default_poll: Some(PollOutcome::Won),
                ..Script::default()
            }),
        }
    }

    pub fn with_payout(self, instrument: &str, percent: f64, open: bool) -> Self {
        self.script.lock().payouts.push(Payout {
            instrument: instrument.to_string(),
            percent,
            open,
        });
        self
    }

    pub fn with_ticks(self, instrument: &str, ticks: Vec<Tick>) -> Self {
        self.script
            .lock()
            .ticks
            .entry(instrument.to_string())
            .or_default()
            .extend(ticks);
        self
    }

    pub fn fail_next_place(&self, error: GatewayError) {
        self.script.lock().place_results.push_back(Err(error));
    }

    pub fn script_polls(&self, polls: impl IntoIterator<Item = Result<PollOutcome, GatewayError>>) {
        self.script.lock().polls.extend(polls);
    }

    pub fn set_default_poll(&self, poll: PollOutcome) {
        self.script.lock().default_poll = Some(poll);
    }

    pub fn panic_on_poll(&self) {
        self.script.lock().panic_on_poll = true;
    }

    pub fn panic_on_fetch(&self) {
        self.script.lock().panic_on_fetch = true;
    }

    pub fn fail_fetch(&self, instrument: &str) {
        self.script.lock().failing_fetch.push(instrument.to_string());
    }

    pub fn remove_payout(&self, instrument: &str) {
        self.script.lock().payouts.retain(|p| p.instrument != instrument);
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.script.lock().placed.clone()
    }

    pub fn poll_calls(&self) -> u32 {
        self.script.lock().poll_calls
    }

    pub fn fetch_calls(&self) -> u32 {
        self.script.lock().fetch_calls
    }

    pub fn payout_calls(&self) -> u32 {
        self.script.lock().payout_calls
    }
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.script.lock().connected = true;
        Ok(())
    }

    async fn balance(&self) -> Result<f64, GatewayError> {
        Ok(10_000.0)
    }

    async fn payouts(&self) -> Result<Vec<Payout>, GatewayError> {
        let mut script = self.script.lock();
        script.payout_calls += 1;
        Ok(script.payouts.clone())
    }

    async fn fetch_ticks(
        &self,
        instrument: &str,
        _period: Period,
    ) -> Result<Vec<Tick>, GatewayError> {
        let now = self.clock.now();
        let panic = {
            let mut script = self.script.lock();
            script.fetch_calls += 1;
            script.panic_on_fetch
        };
        if panic {
            panic!("scripted fetch panic");
        }
        let script = self.script.lock();
        if script.failing_fetch.iter().any(|i| i == instrument) {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        Ok(script
            .ticks
            .get(instrument)
            .map(|ticks| ticks.iter().filter(|t| t.time <= now).cloned().collect())
            .unwrap_or_default())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<TradeId, GatewayError> {
        let mut script = self.script.lock();
        if let Some(result) = script.place_results.pop_front() {
            if result.is_ok() {
                script.placed.push(request.clone());
            }
            return result;
        }
        script.next_id += 1;
        script.placed.push(request.clone());
        Ok(TradeId::new(format!("T-{}", script.next_id)))
    }

    async fn poll_outcome(&self, _id: &TradeId) -> Result<PollOutcome, GatewayError> {
        let (answer, panic) = {
            let mut script = self.script.lock();
            script.poll_calls += 1;
            let answer = script
                .polls
                .pop_front()
                .unwrap_or(Ok(script.default_poll.unwrap_or(PollOutcome::Pending)));
            (answer, script.panic_on_poll)
        };
        if panic {
            panic!("scripted poll panic");
        }
        answer
    }
}

// ── Risk helpers ──

pub fn risk(clock: Arc<dyn Clock>) -> Arc<RiskManager> {
    Arc::new(RiskManager::new(RiskConfig::default(), clock))
}

pub fn reserve(risk: &RiskManager, instrument: &str) -> Reservation {
    risk.reserve(instrument).expect("fresh instrument is eligible")
}

pub fn intent(expiration_secs: u64) -> OrderIntent {
    OrderIntent {
        direction: Direction::Long,
        expiration_secs,
        price: 1.1,
        features: Default::default(),
    }
}
