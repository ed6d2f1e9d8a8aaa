//! Tick → candle aggregation.
//!
//! `CandleAggregator` turns raw ticks into closed, period-aligned candles and
//! merges them into a bounded `CandleSeries`. `CandleBook` keeps one series
//! per instrument for the cycle loop.

pub mod aggregator;
pub mod book;
pub mod series;

pub use aggregator::CandleAggregator;
pub use book::CandleBook;
pub use series::{CandleSeries, DEFAULT_CAPACITY};

use thiserror::Error;

/// Data problems that skip one instrument for one cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("no usable ticks for {0}")]
    EmptyTicks(String),

    #[error("insufficient history: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
}
