use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{CandleAggregator, CandleSeries, DataError};
use crate::domain::{Candle, Tick};

/// One candle series per instrument, owned by the cycle loop.
#[derive(Debug, Clone)]
pub struct CandleBook {
    aggregator: CandleAggregator,
    series: HashMap<String, CandleSeries>,
}

impl CandleBook {
    pub fn new(aggregator: CandleAggregator) -> Self {
        Self {
            aggregator,
            series: HashMap::new(),
        }
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    /// Aggregate a tick batch into the instrument's series, creating it on
    /// first use.
    pub fn ingest(
        &mut self,
        instrument: &str,
        ticks: &[Tick],
        now: DateTime<Utc>,
    ) -> Result<&CandleSeries, DataError> {
        let aggregator = self.aggregator;
        let series = self
            .series
            .entry(instrument.to_string())
            .or_insert_with(|| aggregator.empty_series(instrument));
        aggregator.update(series, ticks, now)?;
        Ok(&*series)
    }

    /// Merge already-built candles (e.g. broker history) into the series.
    pub fn seed(&mut self, instrument: &str, candles: Vec<Candle>, now: DateTime<Utc>) {
        let aggregator = self.aggregator;
        let boundary = aggregator.period().align_down(now);
        let candles = candles
            .into_iter()
            .filter(|c| c.instrument == instrument && c.is_sane())
            .collect();
        self.series
            .entry(instrument.to_string())
            .or_insert_with(|| aggregator.empty_series(instrument))
            .merge(candles, boundary);
    }

    pub fn get(&self, instrument: &str) -> Result<&CandleSeries, DataError> {
        self.series
            .get(instrument)
            .ok_or_else(|| DataError::UnknownInstrument(instrument.to_string()))
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.series.contains_key(instrument)
    }

    /// Drop series for instruments no longer tracked.
    pub fn retain(&mut self, instruments: &[String]) {
        self.series.retain(|k, _| instruments.iter().any(|i| i == k));
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Period;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn book() -> CandleBook {
        CandleBook::new(CandleAggregator::new(Period::from_secs(60).unwrap()))
    }

    #[test]
    fn ingest_creates_series_lazily() {
        let mut book = book();
        assert!(book.get("X").is_err());
        let ticks = vec![Tick::new("X", t0(), 1.0)];
        let len = book.ingest("X", &ticks, t0() + Duration::minutes(1)).unwrap().len();
        assert_eq!(len, 1);
        assert!(book.contains("X"));
    }

    #[test]
    fn seed_filters_insane_candles_and_in_progress_bucket() {
        let mut book = book();
        let good = Candle {
            instrument: "X".into(),
            open_time: t0(),
            open: 1.0,
            high: 1.2,
            low: 0.9,
            close: 1.1,
        };
        let inverted = Candle {
            open_time: t0() + Duration::minutes(1),
            high: 0.5,
            ..good.clone()
        };
        let forming = Candle {
            open_time: t0() + Duration::minutes(2),
            ..good.clone()
        };
        book.seed("X", vec![good, inverted, forming], t0() + Duration::seconds(150));
        assert_eq!(book.get("X").unwrap().len(), 1);
    }

    #[test]
    fn retain_drops_untracked() {
        let mut book = book();
        book.seed("X", vec![], t0());
        book.seed("Y", vec![], t0());
        book.retain(&["Y".to_string()]);
        assert!(!book.contains("X"));
        assert!(book.contains("Y"));
    }
}
