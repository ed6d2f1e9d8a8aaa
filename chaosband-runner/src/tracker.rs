//! Trade lifecycle tracker — placement, monitoring and settlement.
//!
//! Monitor tasks only compute an outcome. They hand a `Settlement` back
//! through the `JoinSet`, and the tracker applies it on the cycle's task:
//! the terminal transition, the risk update, the audit event and removal
//! from the active set all happen in `settle`, keyed by removal from the
//! active set, so a trade resolves exactly once.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chaosband_core::clock::Clock;
use chaosband_core::domain::{Direction, Outcome, Trade, TradeId};
use chaosband_core::risk::{Reservation, RiskManager};
use chaosband_core::signal::Features;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, GatewayError, OrderRequest};
use crate::telemetry::{emit, AuditEvent, TelemetrySink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Extra wait after expiration before the first poll.
    pub grace_secs: u64,
    /// Polls after the first one before giving up as timed out.
    pub poll_retries: u32,
    pub retry_backoff_secs: u64,
    /// Upper bound on a single broker call.
    pub call_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            grace_secs: 10,
            poll_retries: 3,
            retry_backoff_secs: 2,
            call_timeout_secs: 10,
        }
    }
}

impl TrackerConfig {
    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

/// Outcome computed by a monitor task, waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub trade_id: TradeId,
    pub outcome: Outcome,
    /// Broker polls spent reaching the outcome.
    pub polls: u32,
    /// When the monitor reached the outcome.
    pub settled_at: DateTime<Utc>,
}

/// Everything the placed-trade audit record needs beyond the reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub direction: Direction,
    pub expiration_secs: u64,
    pub price: f64,
    pub features: Features,
}

pub struct TradeTracker {
    broker: Arc<dyn Broker>,
    risk: Arc<RiskManager>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    active: DashMap<TradeId, Trade>,
    monitors: JoinSet<Settlement>,
}

impl std::fmt::Debug for TradeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeTracker")
            .field("config", &self.config)
            .field("active", &self.active.len())
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

impl TradeTracker {
    pub fn new(
        broker: Arc<dyn Broker>,
        risk: Arc<RiskManager>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            broker,
            risk,
            telemetry,
            clock,
            config,
            active: DashMap::new(),
            monitors: JoinSet::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Snapshot of every pending trade, oldest first.
    pub fn active_trades(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self.active.iter().map(|e| e.value().clone()).collect();
        trades.sort_by(|a, b| a.placed_at.cmp(&b.placed_at).then(a.id.cmp(&b.id)));
        trades
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Place the order for a reservation and start monitoring it.
    ///
    /// On failure the reservation is rolled back before the error is
    /// returned, so the risk state never counts a trade the broker refused.
    pub async fn submit(
        &mut self,
        reservation: Reservation,
        intent: OrderIntent,
    ) -> Result<TradeId, GatewayError> {
        let request = OrderRequest {
            instrument: reservation.instrument.clone(),
            direction: intent.direction,
            stake: reservation.stake,
            expiration_secs: intent.expiration_secs,
        };

        let timeout = self.config.call_timeout();
        let placed = match tokio::time::timeout(timeout, self.broker.place_order(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };
        let id = match placed {
            Ok(id) => id,
            Err(e) => {
                self.risk.rollback(&reservation);
                warn!(
                    instrument = %request.instrument,
                    stake = request.stake,
                    error = %e,
                    "order placement failed"
                );
                return Err(e);
            }
        };

        let trade = Trade::pending(
            id.clone(),
            request.instrument.clone(),
            request.direction,
            request.stake,
            request.expiration_secs,
            self.clock.now(),
        );
        self.risk.record_trade_id(&trade.instrument, id.clone());
        emit(
            self.telemetry.as_ref(),
            &AuditEvent::TradePlaced {
                at: trade.placed_at,
                trade_id: id.clone(),
                instrument: trade.instrument.clone(),
                direction: trade.direction,
                stake: trade.stake,
                expiration_secs: trade.expiration_secs,
                price: intent.price,
                features: intent.features,
            },
        );
        self.active.insert(id.clone(), trade);
        self.spawn_monitor(id.clone(), request.expiration_secs);
        Ok(id)
    }

    fn spawn_monitor(&mut self, id: TradeId, expiration_secs: u64) {
        let broker = Arc::clone(&self.broker);
        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();
        self.monitors.spawn(async move {
            let watched = id.clone();
            let monitored = monitor(broker, Arc::clone(&clock), id, expiration_secs, config);
            match AssertUnwindSafe(monitored)
                .catch_unwind()
                .await
            {
                Ok(settlement) => settlement,
                Err(_) => {
                    error!(trade_id = %watched, "trade monitor panicked; settling as timed out");
                    Settlement {
                        trade_id: watched,
                        outcome: Outcome::TimedOut,
                        polls: 0,
                        settled_at: clock.now(),
                    }
                }
            }
        });
    }

    /// Apply every settlement that is already available, without waiting.
    pub fn reap(&mut self) -> Vec<Trade> {
        let mut resolved = Vec::new();
        while let Some(Some(joined)) = self.monitors.join_next().now_or_never() {
            match joined {
                Ok(settlement) => resolved.extend(self.settle(settlement)),
                Err(e) => error!(error = %e, "trade monitor task failed"),
            }
        }
        resolved
    }

    /// Wait for every outstanding monitor and apply its settlement.
    pub async fn drain(&mut self) -> Vec<Trade> {
        let mut resolved = Vec::new();
        while let Some(joined) = self.monitors.join_next().await {
            match joined {
                Ok(settlement) => resolved.extend(self.settle(settlement)),
                Err(e) => error!(error = %e, "trade monitor task failed"),
            }
        }
        resolved
    }

    /// Apply one settlement. Returns the resolved trade, or `None` if the
    /// trade is no longer active (already settled or never tracked).
    pub fn settle(&self, settlement: Settlement) -> Option<Trade> {
        let Some((_, mut trade)) = self.active.remove(&settlement.trade_id) else {
            debug!(trade_id = %settlement.trade_id, "duplicate settlement ignored");
            return None;
        };
        if let Err(e) = trade.resolve(settlement.outcome) {
            warn!(error = %e, "settlement for a terminal trade ignored");
            return None;
        }

        self.risk
            .on_trade_resolved(&trade.instrument, settlement.outcome);
        emit(
            self.telemetry.as_ref(),
            &AuditEvent::TradeResolved {
                at: settlement.settled_at,
                trade_id: trade.id.clone(),
                instrument: trade.instrument.clone(),
                direction: trade.direction,
                stake: trade.stake,
                outcome: settlement.outcome,
            },
        );
        info!(
            trade_id = %trade.id,
            instrument = %trade.instrument,
            outcome = %settlement.outcome,
            polls = settlement.polls,
            "trade settled"
        );
        Some(trade)
    }

    /// Stop every monitor without applying its outcome. Active trades stay
    /// pending.
    pub fn abandon(&mut self) -> usize {
        let n = self.monitors.len();
        self.monitors.abort_all();
        n
    }
}

/// Sleep until expiration plus grace, then poll with bounded retries.
///
/// Transient failures and `Pending` are retried; anything else, or running
/// out of retries, ends as `TimedOut`.
async fn monitor(
    broker: Arc<dyn Broker>,
    clock: Arc<dyn Clock>,
    id: TradeId,
    expiration_secs: u64,
    config: TrackerConfig,
) -> Settlement {
    let first_poll = expiration_secs.saturating_add(config.grace_secs);
    tokio::time::sleep(Duration::from_secs(first_poll)).await;

    let timeout = config.call_timeout();
    let attempts = config.poll_retries + 1;
    for attempt in 1..=attempts {
        let polled = match tokio::time::timeout(timeout, broker.poll_outcome(&id)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };
        match polled {
            Ok(poll) => {
                if let Some(outcome) = poll.settled() {
                    return Settlement {
                        trade_id: id,
                        outcome,
                        polls: attempt,
                        settled_at: clock.now(),
                    };
                }
                debug!(trade_id = %id, attempt, "trade still pending");
            }
            Err(e) if e.is_transient() => {
                warn!(trade_id = %id, attempt, error = %e, "outcome poll failed; retrying");
            }
            Err(e) => {
                warn!(trade_id = %id, attempt, error = %e, "outcome poll failed permanently");
                return Settlement {
                    trade_id: id,
                    outcome: Outcome::TimedOut,
                    polls: attempt,
                    settled_at: clock.now(),
                };
            }
        }
        if attempt < attempts {
            tokio::time::sleep(Duration::from_secs(config.retry_backoff_secs)).await;
        }
    }

    warn!(trade_id = %id, attempts, "no definitive outcome; settling as timed out");
    Settlement {
        trade_id: id,
        outcome: Outcome::TimedOut,
        polls: attempts,
        settled_at: clock.now(),
    }
}
