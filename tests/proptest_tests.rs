//! Property-based tests for scheduling and optimization invariants.
//!
//! These verify that:
//! 1. Trade requests always come out in non-decreasing weight-delta order,
//!    with ties broken by symbol
//! 2. Scheduling the same day twice with unchanged inputs is idempotent
//! 3. Zero-delta instruments never produce a request and settle immediately
//! 4. Optimized weight sets are long-only and sum to at most one

use chrono::NaiveDate;
use folio::{PriceTable, RebalanceBook, TradeScheduler, WeightOptimizer};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy generating a small universe of (symbol, weight delta, position).
fn universe_strategy() -> impl Strategy<Value = Vec<(String, f64, f64)>> {
    prop::collection::vec((-0.5f64..0.5, 0.0f64..1000.0), 1..8).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (delta, position))| (format!("SYM{:02}", i), delta, position))
            .collect()
    })
}

fn scheduler() -> TradeScheduler {
    TradeScheduler::new([1, 4, 7, 10].into_iter().collect())
}

fn in_window_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 3).unwrap()
}

proptest! {
    #[test]
    fn prop_requests_sorted_by_delta_then_symbol(universe in universe_strategy()) {
        let mut book = RebalanceBook::new(
            universe.iter().map(|(s, _, _)| (s.as_str(), 10.0)),
        );
        let deltas: BTreeMap<String, f64> =
            universe.iter().map(|(s, d, _)| (s.clone(), *d)).collect();
        let positions: BTreeMap<String, f64> =
            universe.iter().map(|(s, _, p)| (s.clone(), *p)).collect();

        let requests = scheduler().schedule_day(in_window_date(), &positions, &mut book, &deltas);

        for pair in requests.windows(2) {
            prop_assert!(
                pair[0].weight_delta < pair[1].weight_delta
                    || (pair[0].weight_delta == pair[1].weight_delta
                        && pair[0].symbol < pair[1].symbol)
            );
        }
    }

    #[test]
    fn prop_schedule_day_idempotent(universe in universe_strategy()) {
        let mut book = RebalanceBook::new(
            universe.iter().map(|(s, _, _)| (s.as_str(), 10.0)),
        );
        let deltas: BTreeMap<String, f64> =
            universe.iter().map(|(s, d, _)| (s.clone(), *d)).collect();
        let positions: BTreeMap<String, f64> =
            universe.iter().map(|(s, _, p)| (s.clone(), *p)).collect();

        let first = scheduler().schedule_day(in_window_date(), &positions, &mut book, &deltas);
        let second = scheduler().schedule_day(in_window_date(), &positions, &mut book, &deltas);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_zero_delta_settles_without_request(universe in universe_strategy()) {
        let mut book = RebalanceBook::new(
            universe.iter().map(|(s, _, _)| (s.as_str(), 10.0)),
        );
        // Zero out every other instrument's delta.
        let deltas: BTreeMap<String, f64> = universe
            .iter()
            .enumerate()
            .map(|(i, (s, d, _))| (s.clone(), if i % 2 == 0 { 0.0 } else { *d }))
            .collect();
        let positions: BTreeMap<String, f64> =
            universe.iter().map(|(s, _, p)| (s.clone(), *p)).collect();

        let requests = scheduler().schedule_day(in_window_date(), &positions, &mut book, &deltas);

        for (symbol, &delta) in &deltas {
            if delta == 0.0 {
                prop_assert!(requests.iter().all(|r| &r.symbol != symbol));
                prop_assert!(!book.is_pending(symbol));
            }
        }
    }

    #[test]
    fn prop_optimized_weights_long_only_and_bounded(
        drifts in prop::collection::vec((-0.002f64..0.003, 0.0f64..6.28, 20.0f64..200.0), 2..5),
        days in 40usize..80,
    ) {
        let symbols: Vec<String> =
            (0..drifts.len()).map(|i| format!("SYM{:02}", i)).collect();
        let mut table = PriceTable::new(symbols.iter().cloned());

        for day in 0..days {
            let closes: BTreeMap<String, f64> = symbols
                .iter()
                .zip(drifts.iter())
                .map(|(symbol, (drift, phase, start))| {
                    let trend = start * (1.0 + drift).powi(day as i32);
                    let wobble = ((day as f64 * 0.9) + phase).sin() * start * 0.004;
                    (symbol.clone(), trend + wobble)
                })
                .collect();
            table.push_day(&closes).unwrap();
        }

        let matrix = table.matrix(days).unwrap();

        // Pathological random inputs may be infeasible; when the solve
        // succeeds, the weight set must be long-only and within budget.
        if let Ok(weights) = WeightOptimizer::default().optimize(&matrix) {
            prop_assert!(weights.total() <= 1.0 + 1e-6);
            for (_, &w) in weights.iter() {
                prop_assert!(w >= 0.0);
            }
        }
    }
}
