//! Heikin-Ashi candle transform.
//!
//! ha_close = (o + h + l + c) / 4
//! ha_open  = (prev_ha_open + prev_ha_close) / 2, seeded with (o + c) / 2
//! ha_high  = max(h, ha_open, ha_close), ha_low = min(l, ha_open, ha_close)

use crate::domain::Candle;

pub fn heikin_ashi(candles: &[Candle]) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for c in candles {
        let ha_close = (c.open + c.high + c.low + c.close) / 4.0;
        let ha_open = match out.last() {
            Some(prev) => (prev.open + prev.close) / 2.0,
            None => (c.open + c.close) / 2.0,
        };
        out.push(Candle {
            instrument: c.instrument.clone(),
            open_time: c.open_time,
            open: ha_open,
            high: c.high.max(ha_open).max(ha_close),
            low: c.low.min(ha_open).min(ha_close),
            close: ha_close,
        });
    }
    out
}
