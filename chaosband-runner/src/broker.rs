//! Broker collaborator — connectivity, market data, order placement and
//! outcome polling.

use async_trait::async_trait;
use chaosband_core::clock::Period;
use chaosband_core::domain::{Direction, Outcome, Tick, TradeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ─── Error type ──────────────────────────────────────────────────────

/// Failures talking to the broker.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("broker session is not connected")]
    Disconnected,

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unknown order {0}")]
    UnknownOrder(TradeId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("broker call timed out after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    /// Worth retrying: the same call may succeed a moment later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

// ─── Wire types ──────────────────────────────────────────────────────

/// Result of polling a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Won,
    Lost,
    Tie,
    /// Not settled yet.
    Pending,
}

impl PollOutcome {
    /// The terminal outcome, if the order has settled.
    pub fn settled(self) -> Option<Outcome> {
        match self {
            Self::Won => Some(Outcome::Won),
            Self::Lost => Some(Outcome::Lost),
            Self::Tie => Some(Outcome::Tie),
            Self::Pending => None,
        }
    }
}

/// Payout offered for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub instrument: String,
    /// Percent of the stake paid on a win, e.g. 85.0.
    pub percent: f64,
    /// Whether the instrument is currently tradable.
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    pub direction: Direction,
    pub stake: f64,
    pub expiration_secs: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────

/// Everything the trading loop needs from a broker.
///
/// Implementations are shared between the cycle and the monitor tasks, so
/// every method takes `&self`.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> Result<(), GatewayError>;

    async fn balance(&self) -> Result<f64, GatewayError>;

    async fn payouts(&self) -> Result<Vec<Payout>, GatewayError>;

    /// Recent ticks for `instrument`. May overlap previously returned ticks;
    /// aggregation is idempotent.
    async fn fetch_ticks(&self, instrument: &str, period: Period)
        -> Result<Vec<Tick>, GatewayError>;

    async fn place_order(&self, request: &OrderRequest) -> Result<TradeId, GatewayError>;

    async fn poll_outcome(&self, id: &TradeId) -> Result<PollOutcome, GatewayError>;
}
