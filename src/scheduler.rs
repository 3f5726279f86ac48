//! Daily trade scheduling and sequencing.
//!
//! Each simulated day inside a rebalance window, the scheduler decides which
//! pending instruments still need trading, sorts them by weight delta
//! ascending so weight decreases trade before increases (sell proceeds free
//! cash before the same day's buys), and emits target-percent orders.
//! Outside the window it closes the cycle by forcing every record back to
//! PENDING.

use crate::broker::Broker;
use crate::error::Result;
use crate::state::RebalanceBook;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// One day's trading intent for a single instrument. Ephemeral: built,
/// sequenced, dispatched, and dropped within the same step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub date: NaiveDate,
    /// Currently held quantity.
    pub position: f64,
    /// Target holding as a fraction of portfolio value.
    pub target_weight: f64,
    /// Signed change from the previous cycle's weight.
    pub weight_delta: f64,
}

/// Decides and sequences each day's trades.
#[derive(Debug, Clone)]
pub struct TradeScheduler {
    rebalance_months: BTreeSet<u32>,
}

impl TradeScheduler {
    /// Create a scheduler trading in the given calendar months.
    pub fn new(rebalance_months: BTreeSet<u32>) -> Self {
        Self { rebalance_months }
    }

    /// Whether a date falls inside the rebalance window.
    pub fn in_window(&self, date: NaiveDate) -> bool {
        self.rebalance_months.contains(&date.month())
    }

    /// Build the day's ordered trade requests.
    ///
    /// Inside the window, every PENDING instrument with a nonzero weight
    /// delta produces one request; instruments whose delta is exactly zero
    /// have nothing to trade and are marked rebalanced on the spot. Outside
    /// the window the cycle closes and all records return to PENDING.
    ///
    /// The result is sorted by weight delta ascending with ties broken by
    /// symbol, so the sequence is deterministic and sells always precede
    /// buys. Calling twice with unchanged inputs yields the same requests.
    pub fn schedule_day(
        &self,
        date: NaiveDate,
        positions: &BTreeMap<String, f64>,
        book: &mut RebalanceBook,
        deltas: &BTreeMap<String, f64>,
    ) -> Vec<TradeRequest> {
        if !self.in_window(date) {
            book.reset_all();
            return Vec::new();
        }

        let mut requests = Vec::new();
        for symbol in book.symbols() {
            if !book.is_pending(&symbol) {
                continue;
            }
            let delta = deltas.get(&symbol).copied().unwrap_or(0.0);
            if delta == 0.0 {
                book.mark_rebalanced(&symbol);
                continue;
            }
            requests.push(TradeRequest {
                position: positions.get(&symbol).copied().unwrap_or(0.0),
                target_weight: book.target_percent(&symbol) / 100.0,
                weight_delta: delta,
                symbol,
                date,
            });
        }

        requests.sort_by(|a, b| {
            a.weight_delta
                .partial_cmp(&b.weight_delta)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        requests
    }

    /// Emit the sequenced requests to the broker.
    ///
    /// A request whose position and target are both zero is a true no-op and
    /// is skipped silently.
    pub fn dispatch(&self, requests: &[TradeRequest], broker: &mut dyn Broker) -> Result<()> {
        for request in requests {
            if request.position == 0.0 && request.target_weight == 0.0 {
                continue;
            }
            info!(
                date = %request.date,
                symbol = %request.symbol,
                position = request.position,
                target_weight = request.target_weight,
                weight_delta = request.weight_delta,
                "sending order"
            );
            broker.order_target_percent(&request.symbol, request.target_weight)?;
        }
        Ok(())
    }
}
