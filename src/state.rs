//! Per-instrument rebalance bookkeeping.
//!
//! Each instrument carries one [`RebalanceRecord`] per cycle: whether it has
//! reached its target and what that target is. The record cycles
//! PENDING → REBALANCED → PENDING for the life of the simulation; nothing is
//! terminal. Records are value types keyed by symbol, so state never aliases
//! a data-feed handle.

use crate::optimizer::WeightSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rebalance status of one instrument for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebalanceRecord {
    /// True once the instrument reached its target (or had nothing to do).
    pub rebalanced: bool,
    /// Target holding as a percent of portfolio value (e.g. 49.5 = 49.5%).
    pub target_percent: f64,
}

impl RebalanceRecord {
    /// Fresh PENDING record with the given target percent.
    pub fn pending(target_percent: f64) -> Self {
        Self {
            rebalanced: false,
            target_percent,
        }
    }
}

/// All per-instrument rebalance records, keyed by symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceBook {
    records: BTreeMap<String, RebalanceRecord>,
}

impl RebalanceBook {
    /// Create a book with PENDING records at the given initial percents.
    pub fn new<'a, I>(assets: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let records = assets
            .into_iter()
            .map(|(symbol, pct)| (symbol.to_string(), RebalanceRecord::pending(pct)))
            .collect();
        Self { records }
    }

    /// Start a new cycle: every record goes back to PENDING with its target
    /// taken from the fresh weight set, scaled by the safety factor so the
    /// combined targets stay under 100% of portfolio value.
    pub fn open_cycle(&mut self, weights: &WeightSet, safety_factor: f64) {
        for (symbol, record) in self.records.iter_mut() {
            *record = RebalanceRecord::pending(weights.weight(symbol) * safety_factor * 100.0);
        }
    }

    /// Mark an instrument's target as reached for this cycle.
    pub fn mark_rebalanced(&mut self, symbol: &str) {
        if let Some(record) = self.records.get_mut(symbol) {
            record.rebalanced = true;
        }
    }

    /// Force an instrument back to PENDING (the rebalance window closed).
    pub fn reset(&mut self, symbol: &str) {
        if let Some(record) = self.records.get_mut(symbol) {
            record.rebalanced = false;
        }
    }

    /// Force every record back to PENDING.
    pub fn reset_all(&mut self) {
        for record in self.records.values_mut() {
            record.rebalanced = false;
        }
    }

    /// Whether an instrument still needs trading this cycle.
    pub fn is_pending(&self, symbol: &str) -> bool {
        self.records
            .get(symbol)
            .map(|r| !r.rebalanced)
            .unwrap_or(false)
    }

    /// Target percent for an instrument, 0.0 if untracked.
    pub fn target_percent(&self, symbol: &str) -> f64 {
        self.records
            .get(symbol)
            .map(|r| r.target_percent)
            .unwrap_or(0.0)
    }

    /// Record for one instrument.
    pub fn record(&self, symbol: &str) -> Option<&RebalanceRecord> {
        self.records.get(symbol)
    }

    /// Iterate (symbol, record) in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RebalanceRecord)> {
        self.records.iter()
    }

    /// Tracked symbols in order.
    pub fn symbols(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> RebalanceBook {
        RebalanceBook::new([("A", 40.0), ("B", 30.0), ("C", 30.0)])
    }

    #[test]
    fn test_initial_records_pending() {
        let book = book();
        assert!(book.is_pending("A"));
        assert_eq!(book.target_percent("B"), 30.0);
        assert!(!book.is_pending("ZZZ"));
    }

    #[test]
    fn test_open_cycle_applies_safety_factor() {
        let mut book = book();
        book.mark_rebalanced("A");

        let weights = WeightSet::from_percents([("A", 50.0), ("B", 20.0), ("C", 30.0)]);
        book.open_cycle(&weights, 0.99);

        assert!(book.is_pending("A"));
        assert!((book.target_percent("A") - 49.5).abs() < 1e-9);
        assert!((book.target_percent("B") - 19.8).abs() < 1e-9);
        assert!((book.target_percent("C") - 29.7).abs() < 1e-9);
    }

    #[test]
    fn test_mark_and_reset_cycle() {
        let mut book = book();
        book.mark_rebalanced("A");
        assert!(!book.is_pending("A"));

        // Window closes: back to PENDING.
        book.reset("A");
        assert!(book.is_pending("A"));

        book.mark_rebalanced("B");
        book.mark_rebalanced("C");
        book.reset_all();
        assert!(book.is_pending("B"));
        assert!(book.is_pending("C"));
    }

    #[test]
    fn test_open_cycle_zeroes_dropped_symbols() {
        let mut book = book();
        let weights = WeightSet::from_percents([("A", 100.0)]);
        book.open_cycle(&weights, 0.99);

        assert_eq!(book.target_percent("B"), 0.0);
        assert!(book.is_pending("B"));
    }
}
