//! Configuration file support.
//!
//! Strategy runs can be described in TOML for reproducibility: the universe
//! with its initial weights, the rebalance schedule, and the backtest's
//! starting cash.

use crate::error::{Result, StrategyError};
use crate::strategy::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete strategy configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyFileConfig {
    /// Strategy settings.
    #[serde(default)]
    pub strategy: StrategySettings,
    /// Backtest settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
}

/// Strategy section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Universe with initial target weights.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    /// Calendar months in which rebalancing happens.
    #[serde(default = "default_rebalance_months")]
    pub rebalance_months: Vec<u32>,
    /// History required before the first optimization.
    #[serde(default = "default_warmup_days")]
    pub warmup_days: usize,
    /// Scale applied to optimized weights.
    #[serde(default = "default_safety_factor")]
    pub safety_factor: f64,
    /// Annualized risk-free rate.
    #[serde(default)]
    pub risk_free_rate: f64,
}

/// One universe entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub symbol: String,
    pub weight_pct: f64,
}

fn default_rebalance_months() -> Vec<u32> {
    vec![1, 4, 7, 10]
}
fn default_warmup_days() -> usize {
    20
}
fn default_safety_factor() -> f64 {
    0.99
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            rebalance_months: default_rebalance_months(),
            warmup_days: default_warmup_days(),
            safety_factor: default_safety_factor(),
            risk_free_rate: 0.0,
        }
    }
}

/// Backtest section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Starting cash.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
}

fn default_capital() -> f64 {
    100_000.0
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
        }
    }
}

impl StrategyFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading configuration from {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: StrategyFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrategyError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert to a validated [`StrategyConfig`].
    pub fn to_strategy_config(&self) -> Result<StrategyConfig> {
        let config = StrategyConfig {
            assets: self
                .strategy
                .assets
                .iter()
                .map(|a| (a.symbol.clone(), a.weight_pct))
                .collect(),
            rebalance_months: self.strategy.rebalance_months.iter().copied().collect(),
            warmup_days: self.strategy.warmup_days,
            safety_factor: self.strategy.safety_factor,
            risk_free_rate: self.strategy.risk_free_rate,
        };
        config.validate()?;
        Ok(config)
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Quarterly rebalancing strategy configuration

[strategy]
rebalance_months = [1, 4, 7, 10]
warmup_days = 20
safety_factor = 0.99
risk_free_rate = 0.0
assets = [
    { symbol = "AGG", weight_pct = 10.0 },
    { symbol = "IEMG", weight_pct = 10.0 },
    { symbol = "IAU", weight_pct = 10.0 },
    { symbol = "MBB", weight_pct = 10.0 },
    { symbol = "IXUS", weight_pct = 10.0 },
    { symbol = "IJH", weight_pct = 10.0 },
    { symbol = "IJR", weight_pct = 10.0 },
    { symbol = "IVW", weight_pct = 10.0 },
    { symbol = "IUSV", weight_pct = 10.0 },
    { symbol = "IGV", weight_pct = 10.0 },
]

[backtest]
initial_capital = 100000.0
"#
        .to_string()
    }
}
