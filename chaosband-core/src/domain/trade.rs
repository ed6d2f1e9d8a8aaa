//! Trade lifecycle types: direction, outcome, status, and the trade record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::TradeId;

/// Directional decision for one instrument in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    /// No trade this cycle.
    #[serde(rename = "none")]
    Flat,
}

impl Direction {
    pub fn is_flat(self) -> bool {
        matches!(self, Self::Flat)
    }

    /// +1.0 for long, -1.0 for short, 0.0 for flat.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
            Self::Flat => 0.0,
        }
    }

    /// Binary-option action name used by the broker ("call" / "put").
    pub fn action(self) -> Option<&'static str> {
        match self {
            Self::Long => Some("call"),
            Self::Short => Some("put"),
            Self::Flat => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Flat => "none",
        };
        f.write_str(s)
    }
}

/// Terminal result of a trade.
///
/// `TimedOut` means the broker never reported a definitive result within the
/// retry budget. For risk purposes it is treated exactly like `Tie`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Won,
    Lost,
    Tie,
    TimedOut,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Tie => "tie",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Trade lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Won,
    Lost,
    Tie,
    TimedOut,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<Outcome> for TradeStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Won => Self::Won,
            Outcome::Lost => Self::Lost,
            Outcome::Tie => Self::Tie,
            Outcome::TimedOut => Self::TimedOut,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("trade {id} already resolved as {status:?}")]
    AlreadyResolved { id: TradeId, status: TradeStatus },
}

/// A placed trade.
///
/// Created in `Pending` on successful submission; transitions exactly once to
/// a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: String,
    pub direction: Direction,
    pub stake: f64,
    pub expiration_secs: u64,
    pub placed_at: DateTime<Utc>,
    pub status: TradeStatus,
}

impl Trade {
    pub fn pending(
        id: TradeId,
        instrument: impl Into<String>,
        direction: Direction,
        stake: f64,
        expiration_secs: u64,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instrument: instrument.into(),
            direction,
            stake,
            expiration_secs,
            placed_at,
            status: TradeStatus::Pending,
        }
    }

    /// Apply the terminal outcome. Fails if the trade is already terminal.
    pub fn resolve(&mut self, outcome: Outcome) -> Result<(), TradeError> {
        if self.status.is_terminal() {
            return Err(TradeError::AlreadyResolved {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = outcome.into();
        Ok(())
    }

    /// When the broker is expected to have settled the trade.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.placed_at + chrono::Duration::seconds(self.expiration_secs as i64)
    }
}
