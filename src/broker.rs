//! Broker interface consumed by the strategy.
//!
//! The strategy never fills orders itself: it asks the broker for current
//! positions, requests target-percent adjustments, and receives order/trade
//! notifications back through the orchestrator. [`SimBroker`] is a minimal
//! synchronous implementation (fills at the latest close, no costs) used by
//! the integration tests.

use crate::error::{Result, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Terminal status reported for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Completed,
    Partial,
    Canceled,
    Rejected,
    Margin,
    Expired,
}

impl OrderStatus {
    /// Whether the order reached its target.
    pub fn is_completed(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }
}

/// Broker-reported order outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderNotice {
    pub symbol: String,
    pub status: OrderStatus,
    /// Signed fill size; zero means there was nothing to do.
    pub size: f64,
    pub price: Option<f64>,
    pub reference: u64,
}

/// Broker-reported trade update; informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeNotice {
    pub symbol: String,
    pub closed: bool,
    pub price: f64,
    pub pnl_gross: f64,
    pub pnl_net: f64,
}

/// External order-execution collaborator.
pub trait Broker {
    /// Current held quantity for a symbol (0.0 when flat).
    fn position(&self, symbol: &str) -> f64;

    /// Request that the holding be adjusted to a fraction of portfolio value.
    fn order_target_percent(&mut self, symbol: &str, target: f64) -> Result<()>;
}

/// Synchronous simulated broker over a cash + positions ledger.
///
/// Orders fill in full at the most recently marked close. A request that is
/// already at target produces a zero-size `Rejected` notice, matching how a
/// real broker reports a no-op order.
#[derive(Debug, Clone)]
pub struct SimBroker {
    cash: f64,
    positions: BTreeMap<String, f64>,
    prices: BTreeMap<String, f64>,
    notices: Vec<OrderNotice>,
    next_reference: u64,
}

impl SimBroker {
    /// Create a broker with the given starting cash.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
            prices: BTreeMap::new(),
            notices: Vec::new(),
            next_reference: 1,
        }
    }

    /// Mark the day's closes; fills use these prices.
    pub fn mark(&mut self, closes: &BTreeMap<String, f64>) {
        for (symbol, close) in closes {
            self.prices.insert(symbol.clone(), *close);
        }
    }

    /// Current cash balance.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash plus marked value of all positions.
    pub fn equity(&self) -> f64 {
        let held: f64 = self
            .positions
            .iter()
            .map(|(symbol, qty)| qty * self.prices.get(symbol).copied().unwrap_or(0.0))
            .sum();
        self.cash + held
    }

    /// Drain order notices accumulated since the last call.
    ///
    /// The driver feeds these back to the strategy at the end of each step,
    /// standing in for a real broker's asynchronous callbacks.
    pub fn drain_notices(&mut self) -> Vec<OrderNotice> {
        std::mem::take(&mut self.notices)
    }

    fn push_notice(&mut self, symbol: &str, status: OrderStatus, size: f64, price: Option<f64>) {
        let reference = self.next_reference;
        self.next_reference += 1;
        self.notices.push(OrderNotice {
            symbol: symbol.to_string(),
            status,
            size,
            price,
            reference,
        });
    }
}

impl Broker for SimBroker {
    fn position(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    fn order_target_percent(&mut self, symbol: &str, target: f64) -> Result<()> {
        let price = self.prices.get(symbol).copied().ok_or_else(|| {
            StrategyError::OrderError(format!("no marked price for {}", symbol))
        })?;
        if price <= 0.0 {
            return Err(StrategyError::OrderError(format!(
                "non-positive price {} for {}",
                price, symbol
            )));
        }

        let target_value = self.equity() * target;
        let held = self.position(symbol);
        let quantity = target_value / price - held;

        if quantity.abs() < 1e-9 {
            debug!(symbol, target, "already at target, rejecting zero-size order");
            self.push_notice(symbol, OrderStatus::Rejected, 0.0, None);
            return Ok(());
        }

        self.cash -= quantity * price;
        *self.positions.entry(symbol.to_string()).or_insert(0.0) += quantity;
        debug!(symbol, quantity, price, "filled target-percent order");
        self.push_notice(symbol, OrderStatus::Completed, quantity, Some(price));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked_broker() -> SimBroker {
        let mut broker = SimBroker::new(100_000.0);
        let closes = [("AGG".to_string(), 100.0), ("IEMG".to_string(), 50.0)]
            .into_iter()
            .collect();
        broker.mark(&closes);
        broker
    }

    #[test]
    fn test_order_target_percent_fills_at_close() {
        let mut broker = marked_broker();
        broker.order_target_percent("AGG", 0.5).unwrap();

        assert!((broker.position("AGG") - 500.0).abs() < 1e-9);
        assert!((broker.cash() - 50_000.0).abs() < 1e-9);
        // Filling at the marked close leaves equity unchanged.
        assert!((broker.equity() - 100_000.0).abs() < 1e-9);

        let notices = broker.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].status, OrderStatus::Completed);
        assert!((notices[0].size - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_reduces_position() {
        let mut broker = marked_broker();
        broker.order_target_percent("AGG", 0.5).unwrap();
        broker.order_target_percent("AGG", 0.2).unwrap();

        assert!((broker.position("AGG") - 200.0).abs() < 1e-9);
        let notices = broker.drain_notices();
        assert!((notices[1].size + 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_already_at_target_reports_zero_size() {
        let mut broker = marked_broker();
        broker.order_target_percent("AGG", 0.5).unwrap();
        broker.drain_notices();

        broker.order_target_percent("AGG", 0.5).unwrap();
        let notices = broker.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].status, OrderStatus::Rejected);
        assert_eq!(notices[0].size, 0.0);
    }

    #[test]
    fn test_unmarked_symbol_is_an_error() {
        let mut broker = marked_broker();
        assert!(broker.order_target_percent("MBB", 0.1).is_err());
    }
}
