//! Error types for the rebalancing strategy.

use thiserror::Error;

/// Main error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("out-of-order price for {symbol}: expected day {expected}, got {got}")]
    InvalidSequence {
        symbol: String,
        expected: usize,
        got: usize,
    },

    #[error("insufficient history: have {have} days, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("optimization infeasible: {0}")]
    OptimizationInfeasible(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("order error: {0}")]
    OrderError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for strategy operations.
pub type Result<T> = std::result::Result<T, StrategyError>;
