//! Trading engine — one cycle of fetch → aggregate → evaluate → gate → submit
//! across every selected instrument.

use std::sync::Arc;
use std::time::Duration;

use chaosband_core::aggregate::{CandleAggregator, CandleBook};
use chaosband_core::clock::Clock;
use chaosband_core::domain::Tick;
use chaosband_core::risk::RiskManager;
use chaosband_core::signal::{FactoryError, SignalEvaluator};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::{Broker, GatewayError};
use crate::config::{BotConfig, ConfigError};
use crate::telemetry::{emit, AuditEvent, TelemetrySink};
use crate::tracker::{OrderIntent, TradeTracker};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("strategy error: {0}")]
    Strategy(#[from] FactoryError),

    #[error("no open instrument pays at least {min_payout}%")]
    NoInstruments { min_payout: f64 },

    #[error("engine has not been prepared")]
    NotPrepared,
}

/// What one cycle did, instrument by instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub instruments: usize,
    /// Instruments whose candles went through the evaluator.
    pub evaluated: usize,
    /// Instruments without usable ticks or enough history.
    pub skipped: usize,
    pub signals: usize,
    pub submitted: usize,
    /// Signals refused by the risk gate.
    pub rejected: usize,
    /// Broker failures while fetching or placing.
    pub failures: usize,
    /// Trades settled at the start of the cycle.
    pub resolved: usize,
    pub active_trades: usize,
}

pub struct TradingEngine {
    config: BotConfig,
    broker: Arc<dyn Broker>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    evaluator: SignalEvaluator,
    risk: Arc<RiskManager>,
    book: CandleBook,
    tracker: TradeTracker,
    instruments: Vec<String>,
    cycles: u64,
    prepared: bool,
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine")
            .field("strategy", &self.evaluator.strategy())
            .field("instruments", &self.instruments)
            .field("cycles", &self.cycles)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl TradingEngine {
    pub fn new(
        config: BotConfig,
        broker: Arc<dyn Broker>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let period = config.period()?;
        let evaluator = SignalEvaluator::new(config.evaluator_config())?;
        let risk = Arc::new(RiskManager::new(config.risk_config(), Arc::clone(&clock)));
        let book = CandleBook::new(
            CandleAggregator::new(period).with_capacity(config.history_capacity),
        );
        let tracker = TradeTracker::new(
            Arc::clone(&broker),
            Arc::clone(&risk),
            Arc::clone(&telemetry),
            Arc::clone(&clock),
            config.tracker.clone(),
        );
        Ok(Self {
            config,
            broker,
            clock,
            telemetry,
            evaluator,
            risk,
            book,
            tracker,
            instruments: Vec::new(),
            cycles: 0,
            prepared: false,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn risk(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    pub fn book(&self) -> &CandleBook {
        &self.book
    }

    pub fn tracker(&self) -> &TradeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TradeTracker {
        &mut self.tracker
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.tracker.call_timeout_secs.max(1))
    }

    /// Connect, log the balance, select instruments and prime their history.
    pub async fn prepare(&mut self) -> Result<(), EngineError> {
        self.broker.connect().await?;
        match self.broker.balance().await {
            Ok(balance) => info!(balance, "account balance"),
            Err(e) => warn!(error = %e, "could not read account balance"),
        }
        self.refresh_instruments().await?;
        self.prepared = true;
        Ok(())
    }

    /// Re-select instruments from the broker's payouts. Newly selected
    /// instruments get their candle history primed; dropped ones lose theirs.
    pub async fn refresh_instruments(&mut self) -> Result<usize, EngineError> {
        let payouts = self.broker.payouts().await?;
        let min_payout = self.config.min_payout_percent;
        let allow = &self.config.instruments;

        let mut selected: Vec<String> = payouts
            .into_iter()
            .filter(|p| p.open && p.percent >= min_payout)
            .filter(|p| allow.is_empty() || allow.contains(&p.instrument))
            .map(|p| p.instrument)
            .collect();
        selected.sort();
        selected.dedup();
        if selected.is_empty() {
            return Err(EngineError::NoInstruments { min_payout });
        }

        for instrument in &selected {
            if self.book.contains(instrument) {
                continue;
            }
            let fetched = self.fetch(instrument).await;
            match fetched {
                Ok(ticks) => match self.book.ingest(instrument, &ticks, self.clock.now()) {
                    Ok(series) => debug!(%instrument, candles = series.len(), "history primed"),
                    Err(e) => debug!(%instrument, error = %e, "no history yet"),
                },
                Err(e) => warn!(%instrument, error = %e, "history fetch failed"),
            }
        }
        self.book.retain(&selected);
        info!(count = selected.len(), min_payout, "instruments selected");
        self.instruments = selected;
        Ok(self.instruments.len())
    }

    async fn fetch(&self, instrument: &str) -> Result<Vec<Tick>, GatewayError> {
        let timeout = self.call_timeout();
        let period = self.book.aggregator().period();
        match tokio::time::timeout(timeout, self.broker.fetch_ticks(instrument, period)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }

    /// Run one cycle over every selected instrument.
    ///
    /// Per-instrument failures are counted in the report and never fail
    /// the cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        if !self.prepared {
            return Err(EngineError::NotPrepared);
        }
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            instruments: self.instruments.len(),
            resolved: self.tracker.reap().len(),
            ..CycleReport::default()
        };

        let instruments = self.instruments.clone();
        for instrument in &instruments {
            self.process(instrument, &mut report).await;
        }

        report.active_trades = self.tracker.active_count();
        info!(
            cycle = report.cycle,
            evaluated = report.evaluated,
            skipped = report.skipped,
            signals = report.signals,
            submitted = report.submitted,
            rejected = report.rejected,
            failures = report.failures,
            resolved = report.resolved,
            active = report.active_trades,
            "cycle complete"
        );
        Ok(report)
    }

    async fn process(&mut self, instrument: &str, report: &mut CycleReport) {
        let fetched = self.fetch(instrument).await;
        let ticks = match fetched {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!(%instrument, error = %e, "tick fetch failed");
                report.failures += 1;
                return;
            }
        };

        let now = self.clock.now();
        let series = match self.book.ingest(instrument, &ticks, now) {
            Ok(series) => series,
            Err(e) => {
                debug!(%instrument, error = %e, "skipping instrument");
                report.skipped += 1;
                return;
            }
        };
        if let Err(e) = series.require(self.config.min_history) {
            debug!(%instrument, error = %e, "skipping instrument");
            report.skipped += 1;
            return;
        }

        let signal = self.evaluator.evaluate(series);
        report.evaluated += 1;
        if !signal.is_actionable() {
            debug!(%instrument, verdict = ?signal.verdict, "no signal");
            return;
        }
        let price = signal
            .features
            .get("close")
            .copied()
            .or_else(|| series.last().map(|c| c.close))
            .unwrap_or(0.0);

        report.signals += 1;
        emit(
            self.telemetry.as_ref(),
            &AuditEvent::SignalDetected {
                at: now,
                instrument: instrument.to_string(),
                direction: signal.direction,
                features: signal.features.clone(),
            },
        );

        let reservation = match self.risk.reserve(instrument) {
            Ok(reservation) => reservation,
            Err(gate) => {
                debug!(%instrument, reason = gate.reason(), "trade gated");
                report.rejected += 1;
                return;
            }
        };

        let intent = OrderIntent {
            direction: signal.direction,
            expiration_secs: self.config.expiration_secs,
            price,
            features: signal.features,
        };
        match self.tracker.submit(reservation, intent).await {
            Ok(_) => report.submitted += 1,
            Err(_) => report.failures += 1,
        }
    }

    /// Stop monitoring. Returns how many monitors were abandoned.
    pub fn shutdown(&mut self) -> usize {
        let abandoned = self.tracker.abandon();
        if abandoned > 0 {
            warn!(abandoned, "outstanding trade monitors abandoned");
        }
        abandoned
    }
}
