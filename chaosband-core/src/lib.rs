//! Chaosband Core — domain types, candle aggregation, indicators, signal evaluation, risk state.
//!
//! Everything in this crate is synchronous and free of I/O:
//! - Domain types (ticks, candles, trades, ids)
//! - Period clock math (aligned boundaries, sleep durations)
//! - Tick → candle aggregation into bounded, deduplicated series
//! - Indicator library (moving averages, ATR/ADX, oscillators, fractals, bands)
//! - Signal evaluator parameterized by strategy configuration
//! - Per-instrument martingale risk state with cooldown and circuit breaker

pub mod aggregate;
pub mod clock;
pub mod domain;
pub mod indicators;
pub mod risk;
pub mod signal;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared between the cycle loop and trade
    /// monitor tasks are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Tick>();
        require_sync::<domain::Tick>();
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::TradeId>();
        require_sync::<domain::TradeId>();

        // Aggregation
        require_send::<aggregate::CandleSeries>();
        require_sync::<aggregate::CandleSeries>();
        require_send::<aggregate::CandleBook>();
        require_sync::<aggregate::CandleBook>();

        // Evaluation
        require_send::<signal::SignalEvaluator>();
        require_sync::<signal::SignalEvaluator>();
        require_send::<signal::Signal>();
        require_sync::<signal::Signal>();

        // Risk
        require_send::<risk::RiskManager>();
        require_sync::<risk::RiskManager>();
        require_send::<risk::Reservation>();
        require_sync::<risk::Reservation>();

        // Clocks
        require_send::<clock::SystemClock>();
        require_sync::<clock::SystemClock>();
        require_send::<clock::ManualClock>();
        require_sync::<clock::ManualClock>();
    }

    /// Evaluation is a pure function of the candle slice: the trait takes no
    /// risk or broker state.
    #[test]
    fn candidate_rule_sees_only_candles() {
        fn _check_trait_object_builds(
            rule: &dyn signal::CandidateRule,
            candles: &[domain::Candle],
        ) -> signal::Candidate {
            rule.candidate(candles)
        }
    }
}
