use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::{CandleSeries, DataError, DEFAULT_CAPACITY};
use crate::clock::Period;
use crate::domain::{Candle, Tick};

/// Buckets ticks into closed candles of one fixed period.
#[derive(Debug, Clone, Copy)]
pub struct CandleAggregator {
    period: Period,
    capacity: usize,
}

impl CandleAggregator {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn empty_series(&self, instrument: &str) -> CandleSeries {
        CandleSeries::new(instrument, self.capacity)
    }

    /// Group ticks into closed candles, ascending by open time.
    ///
    /// Ticks for other instruments and ticks with unusable prices are
    /// ignored. The bucket containing `now` is still forming and is never
    /// returned. Ticks sharing a timestamp keep their input order, so the
    /// later one in the batch becomes the close.
    pub fn bucketize(&self, instrument: &str, ticks: &[Tick], now: DateTime<Utc>) -> Vec<Candle> {
        let boundary = self.period.align_down(now);

        let mut usable: Vec<&Tick> = ticks
            .iter()
            .filter(|t| t.instrument == instrument && t.is_valid())
            .collect();
        usable.sort_by_key(|t| t.time);

        let mut buckets: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
        for tick in usable {
            let open_time = self.period.align_down(tick.time);
            if open_time >= boundary {
                continue;
            }
            buckets
                .entry(open_time)
                .and_modify(|c| {
                    c.high = c.high.max(tick.price);
                    c.low = c.low.min(tick.price);
                    c.close = tick.price;
                })
                .or_insert_with(|| Candle {
                    instrument: instrument.to_string(),
                    open_time,
                    open: tick.price,
                    high: tick.price,
                    low: tick.price,
                    close: tick.price,
                });
        }

        buckets.into_values().collect()
    }

    /// Merge a tick batch into `series`.
    ///
    /// Returns the number of closed buckets computed from the batch. A batch
    /// without a single usable tick is `DataError::EmptyTicks` and leaves the
    /// series untouched.
    pub fn update(
        &self,
        series: &mut CandleSeries,
        ticks: &[Tick],
        now: DateTime<Utc>,
    ) -> Result<usize, DataError> {
        let instrument = series.instrument().to_string();
        let any_usable = ticks
            .iter()
            .any(|t| t.instrument == instrument && t.is_valid());
        if !any_usable {
            return Err(DataError::EmptyTicks(instrument));
        }

        let fresh = self.bucketize(&instrument, ticks, now);
        let produced = fresh.len();
        series.merge(fresh, self.period.align_down(now));
        Ok(produced)
    }
}
