//! Risk management — per-instrument gating and martingale stake sizing.

pub mod config;
pub mod manager;
pub mod state;

pub use config::{MartingaleConfig, RiskConfig};
pub use manager::{Reservation, RiskManager};
pub use state::{Eligibility, InstrumentState};
