//! Chaosband Runner — the live trading loop.
//!
//! This crate builds on `chaosband-core` to provide:
//! - Bot configuration (TOML, validation, fingerprint)
//! - Broker collaborator trait and a seeded paper broker
//! - Telemetry sinks (tracing, JSON lines, CSV trade log)
//! - Trade lifecycle tracker with supervised monitor tasks
//! - Trading engine (one cycle) and the period-aligned scheduler

pub mod broker;
pub mod clock;
pub mod config;
pub mod engine;
pub mod paper;
pub mod scheduler;
pub mod telemetry;
pub mod tracker;

pub use broker::{Broker, GatewayError, OrderRequest, Payout, PollOutcome};
pub use clock::TokioClock;
pub use config::{BotConfig, ConfigError};
pub use engine::{CycleReport, EngineError, TradingEngine};
pub use paper::{PaperBroker, PaperConfig};
pub use scheduler::{Scheduler, SchedulerStats};
pub use telemetry::{
    emit, AuditEvent, CsvTradeLog, FanoutSink, JsonlSink, MemorySink, TelemetryConfig,
    TelemetryError, TelemetrySink, TracingSink,
};
pub use tracker::{OrderIntent, Settlement, TrackerConfig, TradeTracker};
