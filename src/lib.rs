//! Folio - a portfolio-rebalancing backtest strategy.
//!
//! # Overview
//!
//! Folio implements the decision engine of a periodic portfolio-rebalancing
//! strategy: on the first day of each configured rebalance month (quarterly
//! by default) it re-optimizes target weights with a long-only maximum-Sharpe
//! mean-variance optimization, then issues target-percent orders to move the
//! simulated portfolio toward the new targets, sequencing weight decreases
//! before increases so sell proceeds free cash for the same day's buys.
//!
//! Order execution is delegated to an external broker behind the [`broker::Broker`]
//! trait; a minimal synchronous [`broker::SimBroker`] is included for tests
//! and experimentation.
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use folio::{RebalanceStrategy, SimBroker, StrategyConfig};
//! use std::collections::BTreeMap;
//!
//! let config = StrategyConfig::new(vec![
//!     ("AGG".to_string(), 40.0),
//!     ("IEMG".to_string(), 30.0),
//!     ("IJH".to_string(), 30.0),
//! ]);
//! let mut strategy = RebalanceStrategy::new(config).unwrap();
//! let mut broker = SimBroker::new(100_000.0);
//!
//! // Driven once per simulated day by the backtest engine:
//! let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let closes: BTreeMap<String, f64> = [
//!     ("AGG".to_string(), 100.0),
//!     ("IEMG".to_string(), 50.0),
//!     ("IJH".to_string(), 200.0),
//! ]
//! .into_iter()
//! .collect();
//!
//! broker.mark(&closes);
//! strategy.next(date, &closes, &mut broker).unwrap();
//! for notice in broker.drain_notices() {
//!     strategy.on_order(&notice);
//! }
//! ```
//!
//! # Modules
//!
//! - [`history`]: aligned per-instrument close-price series
//! - [`optimizer`]: mean-variance maximum-Sharpe weight optimization
//! - [`state`]: per-instrument rebalance records
//! - [`scheduler`]: daily trade scheduling and sell-before-buy sequencing
//! - [`strategy`]: the day-step orchestrator
//! - [`broker`]: broker trait, notifications, and a simulated broker
//! - [`config`]: TOML configuration files

pub mod broker;
pub mod config;
pub mod error;
pub mod history;
pub mod optimizer;
pub mod scheduler;
pub mod state;
pub mod strategy;

// Re-exports for convenience
pub use broker::{Broker, OrderNotice, OrderStatus, SimBroker, TradeNotice};
pub use config::StrategyFileConfig;
pub use error::{Result, StrategyError};
pub use history::{PriceHistory, PriceMatrix, PriceTable};
pub use optimizer::{Optimize, WeightOptimizer, WeightSet};
pub use scheduler::{TradeRequest, TradeScheduler};
pub use state::{RebalanceBook, RebalanceRecord};
pub use strategy::{RebalanceStrategy, StrategyConfig};
