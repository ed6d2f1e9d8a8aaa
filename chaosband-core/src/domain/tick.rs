//! Tick — a single observed price for an instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One price observation. Ticks within a batch may arrive in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub time: DateTime<Utc>,
    pub price: f64,
}

impl Tick {
    pub fn new(instrument: impl Into<String>, time: DateTime<Utc>, price: f64) -> Self {
        Self {
            instrument: instrument.into(),
            time,
            price,
        }
    }

    /// A tick is usable when its price is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}
