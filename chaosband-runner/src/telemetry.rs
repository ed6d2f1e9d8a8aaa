//! Telemetry — append-only audit events and the sinks that record them.
//!
//! The trading loop emits three events: a fired signal, a placed trade and a
//! resolved trade. Sinks are fire-and-forget from the loop's point of view:
//! `emit` logs a failing sink and carries on.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chaosband_core::domain::{Direction, Outcome, TradeId};
use chaosband_core::signal::Features;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    SignalDetected {
        at: DateTime<Utc>,
        instrument: String,
        direction: Direction,
        features: Features,
    },
    TradePlaced {
        at: DateTime<Utc>,
        trade_id: TradeId,
        instrument: String,
        direction: Direction,
        stake: f64,
        expiration_secs: u64,
        price: f64,
        features: Features,
    },
    TradeResolved {
        at: DateTime<Utc>,
        trade_id: TradeId,
        instrument: String,
        direction: Direction,
        stake: f64,
        outcome: Outcome,
    },
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignalDetected { .. } => "signal_detected",
            Self::TradePlaced { .. } => "trade_placed",
            Self::TradeResolved { .. } => "trade_resolved",
        }
    }
}

/// Destination for audit events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError>;
}

/// Record `event`, logging instead of propagating a sink failure.
pub fn emit(sink: &dyn TelemetrySink, event: &AuditEvent) {
    if let Err(e) = sink.record(event) {
        warn!(event = event.kind(), error = %e, "telemetry sink failed");
    }
}

// ─── Sinks ───────────────────────────────────────────────────────────

/// Writes every event to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        match event {
            AuditEvent::SignalDetected {
                instrument,
                direction,
                features,
                ..
            } => info!(
                %instrument,
                %direction,
                close = features.get("close").copied().unwrap_or(f64::NAN),
                trend = features.get("trend_strength").copied().unwrap_or(f64::NAN),
                volatility = features.get("volatility").copied().unwrap_or(f64::NAN),
                "signal detected"
            ),
            AuditEvent::TradePlaced {
                trade_id,
                instrument,
                direction,
                stake,
                expiration_secs,
                ..
            } => info!(%trade_id, %instrument, %direction, stake, expiration_secs, "trade placed"),
            AuditEvent::TradeResolved {
                trade_id,
                instrument,
                outcome,
                stake,
                ..
            } => info!(%trade_id, %instrument, %outcome, stake, "trade resolved"),
        }
        Ok(())
    }
}

/// Append-only JSON lines file, one event per line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every well-formed event. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<AuditEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(event) = serde_json::from_str(&line) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        let json = serde_json::to_string(event)?;
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

/// One row of the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogRow {
    pub timestamp: String,
    pub pair: String,
    pub direction: String,
    pub amount: f64,
    pub expiration: u64,
    pub signal: String,
    pub price: f64,
    pub result: String,
    pub fractal_upper: f64,
    pub fractal_lower: f64,
    pub chaos_osc: f64,
    pub volatility: f64,
    pub trend_strength: f64,
}

/// CSV trade log: a `placed` row per trade, then a row with its result.
///
/// Resolution rows repeat the placement's price and features, which are
/// remembered until the trade resolves.
#[derive(Debug)]
pub struct CsvTradeLog {
    path: PathBuf,
    strategy: String,
    placed: DashMap<TradeId, TradeLogRow>,
    lock: Mutex<()>,
}

impl CsvTradeLog {
    pub fn new(path: impl Into<PathBuf>, strategy: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            strategy: strategy.into(),
            placed: DashMap::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, row: &TradeLogRow) -> Result<(), TelemetryError> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<TradeLogRow>, TelemetryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader.deserialize().collect::<Result<Vec<TradeLogRow>, _>>()?;
        Ok(rows)
    }
}

fn feature(features: &Features, name: &str) -> f64 {
    features.get(name).copied().unwrap_or(0.0)
}

impl TelemetrySink for CsvTradeLog {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        match event {
            AuditEvent::SignalDetected { .. } => Ok(()),
            AuditEvent::TradePlaced {
                at,
                trade_id,
                instrument,
                direction,
                stake,
                expiration_secs,
                price,
                features,
            } => {
                let row = TradeLogRow {
                    timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    pair: instrument.clone(),
                    direction: direction.action().unwrap_or("none").to_string(),
                    amount: *stake,
                    expiration: *expiration_secs,
                    signal: self.strategy.clone(),
                    price: *price,
                    result: "placed".into(),
                    fractal_upper: feature(features, "fractal_upper"),
                    fractal_lower: feature(features, "fractal_lower"),
                    chaos_osc: feature(features, "chaos_osc"),
                    volatility: feature(features, "volatility"),
                    trend_strength: feature(features, "trend_strength"),
                };
                self.append(&row)?;
                self.placed.insert(trade_id.clone(), row);
                Ok(())
            }
            AuditEvent::TradeResolved {
                at,
                trade_id,
                instrument,
                direction,
                stake,
                outcome,
            } => {
                let row = match self.placed.remove(trade_id) {
                    Some((_, placed)) => TradeLogRow {
                        timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        result: outcome.to_string(),
                        ..placed
                    },
                    None => TradeLogRow {
                        timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        pair: instrument.clone(),
                        direction: direction.action().unwrap_or("none").to_string(),
                        amount: *stake,
                        expiration: 0,
                        signal: self.strategy.clone(),
                        price: 0.0,
                        result: outcome.to_string(),
                        fractal_upper: 0.0,
                        fractal_lower: 0.0,
                        chaos_osc: 0.0,
                        volatility: 0.0,
                        trend_strength: 0.0,
                    },
                };
                self.append(&row)
            }
        }
    }
}

/// Keeps every event in memory. Used by tests and the dry-run summary.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Forwards every event to each inner sink. One failing sink does not stop
/// the others.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        for sink in &self.sinks {
            emit(sink.as_ref(), event);
        }
        Ok(())
    }
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSON lines audit file. Disabled when unset.
    pub jsonl_path: Option<PathBuf>,
    /// CSV trade log. Disabled when unset.
    pub csv_path: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Tracing sink plus whichever file sinks are configured.
    pub fn build(&self, strategy: &str) -> FanoutSink {
        let mut fanout = FanoutSink::new(vec![Arc::new(TracingSink)]);
        if let Some(path) = &self.jsonl_path {
            fanout.push(Arc::new(JsonlSink::new(path.clone())));
        }
        if let Some(path) = &self.csv_path {
            fanout.push(Arc::new(CsvTradeLog::new(path.clone(), strategy)));
        }
        fanout
    }
}
