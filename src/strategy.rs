//! Rebalancing strategy orchestrator.
//!
//! [`RebalanceStrategy`] drives one step per simulated day: it records the
//! day's closes, re-optimizes weights on the first day of each rebalance
//! month (after warmup), opens a fresh rebalance cycle, and hands the day to
//! the scheduler so multi-day windows keep retrying incomplete trades. Order
//! and trade notifications from the broker flow back in through
//! [`RebalanceStrategy::on_order`] and [`RebalanceStrategy::on_trade`].

use crate::broker::{Broker, OrderNotice, TradeNotice};
use crate::error::{Result, StrategyError};
use crate::history::PriceTable;
use crate::optimizer::{Optimize, WeightOptimizer, WeightSet};
use crate::scheduler::TradeScheduler;
use crate::state::RebalanceBook;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Universe as (symbol, initial weight percent) pairs.
    pub assets: Vec<(String, f64)>,
    /// Calendar months in which rebalancing happens.
    pub rebalance_months: BTreeSet<u32>,
    /// Days of history required before the first optimization.
    pub warmup_days: usize,
    /// Scale applied to optimized weights so combined targets stay under
    /// 100% of portfolio value.
    pub safety_factor: f64,
    /// Annualized risk-free rate for the Sharpe objective.
    pub risk_free_rate: f64,
}

impl StrategyConfig {
    /// Config with the default quarterly schedule for the given universe.
    pub fn new(assets: Vec<(String, f64)>) -> Self {
        Self {
            assets,
            ..Default::default()
        }
    }

    /// Check the universe and parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(StrategyError::ConfigError(
                "no assets configured".to_string(),
            ));
        }
        let mut total = 0.0;
        for (symbol, pct) in &self.assets {
            if symbol.is_empty() {
                return Err(StrategyError::ConfigError("empty symbol".to_string()));
            }
            if !pct.is_finite() || *pct < 0.0 {
                return Err(StrategyError::ConfigError(format!(
                    "invalid initial weight {} for {}",
                    pct, symbol
                )));
            }
            total += pct;
        }
        if total > 100.0 + 1e-9 {
            return Err(StrategyError::ConfigError(format!(
                "initial weights sum to {:.2}%, above 100%",
                total
            )));
        }
        if self.rebalance_months.is_empty()
            || self.rebalance_months.iter().any(|m| !(1..=12).contains(m))
        {
            return Err(StrategyError::ConfigError(
                "rebalance months must be within 1..=12".to_string(),
            ));
        }
        if self.warmup_days == 0 {
            return Err(StrategyError::ConfigError(
                "warmup must be at least one day".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.safety_factor) {
            return Err(StrategyError::ConfigError(format!(
                "safety factor {} outside 0..=1",
                self.safety_factor
            )));
        }
        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            rebalance_months: [1, 4, 7, 10].into_iter().collect(),
            warmup_days: 20,
            safety_factor: 0.99,
            risk_free_rate: 0.0,
        }
    }
}

/// Periodic mean-variance rebalancing strategy.
pub struct RebalanceStrategy {
    config: StrategyConfig,
    table: PriceTable,
    optimizer: Box<dyn Optimize>,
    scheduler: TradeScheduler,
    book: RebalanceBook,
    weights: WeightSet,
    deltas: BTreeMap<String, f64>,
    day: usize,
}

impl RebalanceStrategy {
    /// Create a strategy using the default max-Sharpe optimizer.
    pub fn new(config: StrategyConfig) -> Result<Self> {
        let optimizer = Box::new(WeightOptimizer::new(config.risk_free_rate));
        Self::with_optimizer(config, optimizer)
    }

    /// Create a strategy with a custom weight optimizer.
    pub fn with_optimizer(config: StrategyConfig, optimizer: Box<dyn Optimize>) -> Result<Self> {
        config.validate()?;

        let table = PriceTable::new(config.assets.iter().map(|(s, _)| s.clone()));
        let scheduler = TradeScheduler::new(config.rebalance_months.clone());
        let book = RebalanceBook::new(config.assets.iter().map(|(s, p)| (s.as_str(), *p)));

        // Before the first optimization, both the current weights and the
        // deltas are the configured initial weights: if the simulation opens
        // inside a rebalance window, the strategy buys toward them.
        let weights =
            WeightSet::from_percents(config.assets.iter().map(|(s, p)| (s.as_str(), *p)));
        let deltas = weights.delta(&WeightSet::default());

        Ok(Self {
            config,
            table,
            optimizer,
            scheduler,
            book,
            weights,
            deltas,
            day: 0,
        })
    }

    /// Advance one simulated day.
    ///
    /// `closes` must contain one close per configured symbol. The scheduler
    /// runs every day, whether or not a new optimization happened, so trades
    /// left incomplete earlier in the window are retried.
    pub fn next(
        &mut self,
        date: NaiveDate,
        closes: &BTreeMap<String, f64>,
        broker: &mut dyn Broker,
    ) -> Result<()> {
        self.table.push_day(closes)?;
        self.day += 1;

        if self.scheduler.in_window(date) && date.day() == 1 && self.day >= self.config.warmup_days
        {
            self.reoptimize(date);
        }

        let positions: BTreeMap<String, f64> = self
            .book
            .symbols()
            .into_iter()
            .map(|symbol| {
                let position = broker.position(&symbol);
                (symbol, position)
            })
            .collect();

        let requests = self
            .scheduler
            .schedule_day(date, &positions, &mut self.book, &self.deltas);
        self.scheduler.dispatch(&requests, broker)
    }

    /// Re-optimize weights and open a new rebalance cycle.
    ///
    /// An infeasible optimization skips the cycle: the previous weight set
    /// and targets stay in force and the simulation continues.
    fn reoptimize(&mut self, date: NaiveDate) {
        let matrix = match self.table.matrix(self.day) {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!(%date, error = %e, "skipping rebalance cycle: no usable history");
                return;
            }
        };

        let new_weights = match self.optimizer.optimize(&matrix) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(%date, error = %e, "skipping rebalance cycle: optimization failed");
                return;
            }
        };

        self.deltas = new_weights.delta(&self.weights);
        self.book
            .open_cycle(&new_weights, self.config.safety_factor);
        self.weights = new_weights;
        info!(%date, day = self.day, "opened rebalance cycle");
    }

    /// Handle a broker order notification.
    ///
    /// Completion marks the instrument rebalanced for this cycle. A zero-size
    /// order means the position already matched the target, so it counts as
    /// done too. Any other outcome leaves the record PENDING and the
    /// scheduler retries on the next day inside the window.
    pub fn on_order(&mut self, notice: &OrderNotice) {
        if notice.status.is_completed() {
            info!(
                symbol = %notice.symbol,
                reference = notice.reference,
                size = notice.size,
                price = ?notice.price,
                "order completed"
            );
            self.book.mark_rebalanced(&notice.symbol);
        } else {
            info!(
                symbol = %notice.symbol,
                reference = notice.reference,
                status = ?notice.status,
                size = notice.size,
                "order incomplete"
            );
            if notice.size == 0.0 {
                self.book.mark_rebalanced(&notice.symbol);
            }
        }
    }

    /// Handle a broker trade notification. Informational only.
    pub fn on_trade(&self, notice: &TradeNotice) {
        if notice.closed {
            info!(
                symbol = %notice.symbol,
                price = notice.price,
                pnl_gross = notice.pnl_gross,
                pnl_net = notice.pnl_net,
                "trade closed"
            );
        }
    }

    /// Days stepped so far.
    pub fn day(&self) -> usize {
        self.day
    }

    /// Current target weight set.
    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// Current cycle's weight deltas.
    pub fn deltas(&self) -> &BTreeMap<String, f64> {
        &self.deltas
    }

    /// Per-instrument rebalance records.
    pub fn book(&self) -> &RebalanceBook {
        &self.book
    }

    /// Strategy configuration.
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}
