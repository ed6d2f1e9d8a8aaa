//! Paper broker — a seeded random-walk market that settles binary trades.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chaosband_core::clock::{Clock, Period};
use chaosband_core::domain::{Direction, Tick, TradeId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::{Broker, GatewayError, OrderRequest, Payout, PollOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub seed: u64,
    pub instruments: Vec<String>,
    pub start_price: f64,
    /// Largest relative move between two consecutive ticks.
    pub step_volatility: f64,
    pub tick_interval_secs: u64,
    /// Candles of tick history kept and returned on every fetch.
    pub history_candles: u32,
    pub payout_percent: f64,
    pub starting_balance: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            instruments: vec![
                "EURUSD_otc".into(),
                "GBPUSD_otc".into(),
                "USDJPY_otc".into(),
                "AUDCAD_otc".into(),
            ],
            start_price: 1.1,
            step_volatility: 0.0004,
            tick_interval_secs: 5,
            history_candles: 120,
            payout_percent: 85.0,
            starting_balance: 10_000.0,
        }
    }
}

struct Market {
    rng: StdRng,
    price: f64,
    last: Option<DateTime<Utc>>,
    ticks: VecDeque<Tick>,
}

struct PaperOrder {
    instrument: String,
    direction: Direction,
    stake: f64,
    entry: f64,
    expires_at: DateTime<Utc>,
    settled: Option<PollOutcome>,
}

struct PaperState {
    connected: bool,
    balance: f64,
    next_order: u64,
    markets: HashMap<String, Market>,
    orders: HashMap<TradeId, PaperOrder>,
}

/// In-process broker for demo runs and tests.
///
/// Every instrument walks independently from `start_price` with its own RNG
/// derived from the seed, so runs are reproducible for a given clock.
/// A trade settles on the first poll at or after expiry by comparing the
/// last tick at expiry to the entry price.
pub struct PaperBroker {
    config: PaperConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<PaperState>,
}

impl std::fmt::Debug for PaperBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperBroker")
            .field("config", &self.config)
            .finish()
    }
}

impl PaperBroker {
    pub fn new(config: PaperConfig, clock: Arc<dyn Clock>) -> Self {
        let markets = config
            .instruments
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let market = Market {
                    rng: StdRng::seed_from_u64(config.seed.wrapping_add(i as u64)),
                    price: config.start_price,
                    last: None,
                    ticks: VecDeque::new(),
                };
                (name.clone(), market)
            })
            .collect();
        let state = PaperState {
            connected: false,
            balance: config.starting_balance,
            next_order: 1,
            markets,
            orders: HashMap::new(),
        };
        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn open_orders(&self) -> usize {
        self.state
            .lock()
            .orders
            .values()
            .filter(|o| o.settled.is_none())
            .count()
    }

    fn interval(&self) -> Duration {
        Duration::seconds(self.config.tick_interval_secs.max(1) as i64)
    }

    /// Walk `market` forward to `to`, starting `warmup` back if it has never moved.
    fn advance(&self, instrument: &str, market: &mut Market, to: DateTime<Utc>, warmup: Duration) {
        let interval = self.interval();
        let mut t = market.last.unwrap_or(to - warmup);
        while t + interval <= to {
            t += interval;
            let step: f64 = market.rng.gen_range(-1.0..1.0);
            market.price *= 1.0 + step * self.config.step_volatility;
            market.ticks.push_back(Tick::new(instrument, t, market.price));
        }
        market.last = Some(t);
    }

    fn trim(market: &mut Market, keep_from: DateTime<Utc>) {
        while market.ticks.front().is_some_and(|t| t.time <= keep_from) {
            market.ticks.pop_front();
        }
    }

    fn retention(&self, period: Period) -> Duration {
        Duration::seconds(period.secs() as i64 * self.config.history_candles as i64)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.state.lock().connected = true;
        debug!(instruments = self.config.instruments.len(), "paper broker connected");
        Ok(())
    }

    async fn balance(&self) -> Result<f64, GatewayError> {
        let state = self.state.lock();
        if !state.connected {
            return Err(GatewayError::Disconnected);
        }
        Ok(state.balance)
    }

    async fn payouts(&self) -> Result<Vec<Payout>, GatewayError> {
        let state = self.state.lock();
        if !state.connected {
            return Err(GatewayError::Disconnected);
        }
        Ok(self
            .config
            .instruments
            .iter()
            .map(|name| Payout {
                instrument: name.clone(),
                percent: self.config.payout_percent,
                open: true,
            })
            .collect())
    }

    async fn fetch_ticks(
        &self,
        instrument: &str,
        period: Period,
    ) -> Result<Vec<Tick>, GatewayError> {
        let now = self.clock.now();
        let retention = self.retention(period);
        let mut state = self.state.lock();
        if !state.connected {
            return Err(GatewayError::Disconnected);
        }
        let mut market = state
            .markets
            .remove(instrument)
            .ok_or_else(|| GatewayError::Rejected(format!("unknown instrument {instrument}")))?;
        self.advance(instrument, &mut market, now, retention);
        Self::trim(&mut market, now - retention);
        let ticks = market.ticks.iter().cloned().collect();
        state.markets.insert(instrument.to_string(), market);
        Ok(ticks)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<TradeId, GatewayError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if !state.connected {
            return Err(GatewayError::Disconnected);
        }
        if request.direction.is_flat() {
            return Err(GatewayError::Rejected("no direction".into()));
        }
        if !request.stake.is_finite() || request.stake <= 0.0 || request.stake > state.balance {
            return Err(GatewayError::Rejected(format!(
                "stake {} outside available balance {}",
                request.stake, state.balance
            )));
        }
        let warmup = self.interval();
        let mut market = state.markets.remove(&request.instrument).ok_or_else(|| {
            GatewayError::Rejected(format!("unknown instrument {}", request.instrument))
        })?;
        self.advance(&request.instrument, &mut market, now, warmup);
        let entry = market.price;
        state.markets.insert(request.instrument.clone(), market);

        let id = TradeId::new(format!("paper-{}", state.next_order));
        state.next_order += 1;
        state.balance -= request.stake;
        state.orders.insert(
            id.clone(),
            PaperOrder {
                instrument: request.instrument.clone(),
                direction: request.direction,
                stake: request.stake,
                entry,
                expires_at: now + Duration::seconds(request.expiration_secs as i64),
                settled: None,
            },
        );
        debug!(%id, instrument = %request.instrument, entry, "paper order placed");
        Ok(id)
    }

    async fn poll_outcome(&self, id: &TradeId) -> Result<PollOutcome, GatewayError> {
        let now = self.clock.now();
        let warmup = self.interval();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| GatewayError::UnknownOrder(id.clone()))?;
        if let Some(settled) = order.settled {
            return Ok(settled);
        }
        if now < order.expires_at {
            return Ok(PollOutcome::Pending);
        }

        let exit = match state.markets.get_mut(&order.instrument) {
            Some(market) => {
                self.advance(&order.instrument, market, now, warmup);
                market
                    .ticks
                    .iter()
                    .rev()
                    .find(|t| t.time <= order.expires_at)
                    .map_or(market.price, |t| t.price)
            }
            None => order.entry,
        };

        let outcome = match order.direction {
            _ if exit == order.entry => PollOutcome::Tie,
            Direction::Long if exit > order.entry => PollOutcome::Won,
            Direction::Short if exit < order.entry => PollOutcome::Won,
            _ => PollOutcome::Lost,
        };
        order.settled = Some(outcome);
        match outcome {
            PollOutcome::Won => {
                state.balance += order.stake * (1.0 + self.config.payout_percent / 100.0)
            }
            PollOutcome::Tie => state.balance += order.stake,
            PollOutcome::Lost | PollOutcome::Pending => {}
        }
        debug!(%id, entry = order.entry, exit, ?outcome, "paper order settled");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaosband_core::clock::ManualClock;
    use chrono::TimeZone;

    fn broker() -> (PaperBroker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 30).unwrap(),
        ));
        (PaperBroker::new(PaperConfig::default(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn calls_before_connect_fail() {
        let (b, _) = broker();
        assert_eq!(b.balance().await, Err(GatewayError::Disconnected));
        b.connect().await.unwrap();
        assert_eq!(b.balance().await, Ok(10_000.0));
    }

    #[tokio::test]
    async fn tick_window_is_bounded_by_retention() {
        let (b, clock) = broker();
        b.connect().await.unwrap();
        let period = Period::from_secs(60).unwrap();
        let first = b.fetch_ticks("EURUSD_otc", period).await.unwrap();
        assert_eq!(first.len(), 120 * 60 / 5);

        clock.advance(Duration::seconds(60));
        let second = b.fetch_ticks("EURUSD_otc", period).await.unwrap();
        assert_eq!(second.len(), first.len());
        assert!(second.windows(2).all(|w| w[0].time < w[1].time));
        assert!(second.iter().all(|t| t.is_valid()));
    }
}
