use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::DataError;
use crate::domain::Candle;

/// Default number of candles kept per instrument.
pub const DEFAULT_CAPACITY: usize = 200;

/// Ordered, bounded candle history for one instrument.
///
/// Open times are strictly increasing with no duplicates, and the series
/// never holds more than `capacity` candles (oldest are dropped first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    instrument: String,
    capacity: usize,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(instrument: impl Into<String>, capacity: usize) -> Self {
        Self {
            instrument: instrument.into(),
            capacity: capacity.max(1),
            candles: Vec::new(),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The candle slice, or `InsufficientHistory` when shorter than `min`.
    pub fn require(&self, min: usize) -> Result<&[Candle], DataError> {
        if self.candles.len() < min {
            return Err(DataError::InsufficientHistory {
                have: self.candles.len(),
                need: min,
            });
        }
        Ok(&self.candles)
    }

    /// Merge freshly computed candles into the series.
    ///
    /// On duplicate open time the incoming candle wins. Anything opening at or
    /// after `boundary` is dropped, then the result is truncated to capacity.
    pub fn merge(&mut self, fresh: Vec<Candle>, boundary: DateTime<Utc>) {
        let mut by_time: BTreeMap<DateTime<Utc>, Candle> = self
            .candles
            .drain(..)
            .map(|c| (c.open_time, c))
            .collect();
        for candle in fresh {
            by_time.insert(candle.open_time, candle);
        }

        let mut merged: Vec<Candle> = by_time
            .into_values()
            .filter(|c| c.open_time < boundary)
            .collect();
        if merged.len() > self.capacity {
            merged.drain(..merged.len() - self.capacity);
        }
        self.candles = merged;
    }
}
