//! Domain types for chaosband

pub mod candle;
pub mod ids;
pub mod tick;
pub mod trade;

pub use candle::Candle;
pub use ids::TradeId;
pub use tick::Tick;
pub use trade::{Direction, Outcome, Trade, TradeError, TradeStatus};

/// Instrument identifier (e.g. "EURUSD_otc").
pub type Instrument = String;
