//! Mean-variance weight optimization.
//!
//! [`WeightOptimizer`] estimates annualized mean returns and a sample
//! covariance matrix from an aligned close-price matrix, then solves for the
//! long-only maximum-Sharpe portfolio as a conic QP:
//!
//! minimize wᵀΣw subject to (μ − rf)ᵀw = 1, w ≥ 0,
//!
//! with the solution normalized to sum to 1. Weights come back as an
//! immutable [`WeightSet`] snapshot; cycle-over-cycle changes are an explicit
//! [`WeightSet::delta`] rather than in-place mutation.

use crate::error::{Result, StrategyError};
use crate::history::PriceMatrix;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, NonnegativeConeT, SolverStatus,
    SupportedConeT, ZeroConeT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trading days per year, used to annualize daily statistics.
const TRADING_DAYS: f64 = 252.0;

/// Immutable per-cycle snapshot of target weights, keyed by symbol.
///
/// Weights are fractional (0.55 = 55% of portfolio value). Produced fresh
/// each rebalance cycle; the previous snapshot is only needed long enough to
/// compute the delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    weights: BTreeMap<String, f64>,
}

impl WeightSet {
    /// Build a snapshot from fractional weights.
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self { weights }
    }

    /// Build a snapshot from (symbol, percent) pairs, e.g. `("AGG", 10.0)`.
    pub fn from_percents<'a, I>(assets: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let weights = assets
            .into_iter()
            .map(|(symbol, pct)| (symbol.to_string(), pct / 100.0))
            .collect();
        Self { weights }
    }

    /// Weight for a symbol, 0.0 if absent.
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Iterate (symbol, weight) in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.weights.iter()
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Per-symbol change from a previous snapshot (`self − previous`).
    ///
    /// Symbols present in either snapshot appear in the result; a symbol the
    /// optimizer dropped shows up as a negative delta.
    pub fn delta(&self, previous: &WeightSet) -> BTreeMap<String, f64> {
        let mut deltas = BTreeMap::new();
        for symbol in self.weights.keys().chain(previous.weights.keys()) {
            deltas
                .entry(symbol.clone())
                .or_insert_with(|| self.weight(symbol) - previous.weight(symbol));
        }
        deltas
    }
}

/// Produces a target weight set from an aligned price matrix.
///
/// The strategy talks to its optimizer through this trait, so alternative
/// objectives (or a failing double in tests) can stand in for the default
/// max-Sharpe solve.
pub trait Optimize: Send + Sync {
    /// Compute target weights for one rebalance cycle.
    fn optimize(&self, matrix: &PriceMatrix) -> Result<WeightSet>;
}

/// Long-only mean-variance optimizer over an aligned price matrix.
#[derive(Debug, Clone)]
pub struct WeightOptimizer {
    risk_free_rate: f64,
}

impl WeightOptimizer {
    /// Create an optimizer with the given annualized risk-free rate.
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// Compute maximum-Sharpe target weights from a price matrix.
    ///
    /// Falls back to the minimum-variance portfolio when every excess return
    /// is non-positive, since the Sharpe transform has no feasible solution
    /// there. A solver failure surfaces as
    /// [`StrategyError::OptimizationInfeasible`].
    pub fn optimize(&self, matrix: &PriceMatrix) -> Result<WeightSet> {
        let estimate = Estimate::from_matrix(matrix)?;

        let excess: Vec<f64> = estimate
            .mean_returns
            .iter()
            .map(|&r| r - self.risk_free_rate)
            .collect();

        let raw = if excess.iter().all(|&r| r <= 0.0) {
            let ones = vec![1.0; estimate.symbols.len()];
            solve_long_only(&estimate.covariance, &ones)?
        } else {
            let x = solve_long_only(&estimate.covariance, &excess)?;
            let sum: f64 = x.iter().sum();
            if sum <= 0.0 {
                return Err(StrategyError::OptimizationInfeasible(
                    "degenerate max-Sharpe solution".to_string(),
                ));
            }
            x.iter().map(|w| w / sum).collect()
        };

        let weights = estimate
            .symbols
            .iter()
            .zip(raw.iter())
            .map(|(s, &w)| (s.clone(), w.max(0.0)))
            .collect();

        Ok(WeightSet::new(weights))
    }
}

impl Default for WeightOptimizer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Optimize for WeightOptimizer {
    fn optimize(&self, matrix: &PriceMatrix) -> Result<WeightSet> {
        WeightOptimizer::optimize(self, matrix)
    }
}

/// Annualized return and covariance estimates for one optimization cycle.
struct Estimate {
    symbols: Vec<String>,
    mean_returns: Vec<f64>,
    covariance: Vec<Vec<f64>>,
}

impl Estimate {
    fn from_matrix(matrix: &PriceMatrix) -> Result<Self> {
        let symbols = matrix.symbols().to_vec();
        let n = symbols.len();
        if n == 0 {
            return Err(StrategyError::InvalidInput(
                "price matrix has no instruments".to_string(),
            ));
        }
        if matrix.days() < 2 {
            return Err(StrategyError::InsufficientHistory {
                have: matrix.days(),
                need: 2,
            });
        }

        let returns: Vec<Vec<f64>> = (0..n)
            .map(|col| {
                matrix
                    .column(col)
                    .windows(2)
                    .map(|w| (w[1] - w[0]) / w[0])
                    .collect()
            })
            .collect();

        let periods = returns[0].len() as f64;
        let means: Vec<f64> = returns
            .iter()
            .map(|r| r.iter().sum::<f64>() / periods)
            .collect();

        let mean_returns: Vec<f64> = means.iter().map(|m| m * TRADING_DAYS).collect();

        let mut covariance = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let cov = returns[i]
                    .iter()
                    .zip(returns[j].iter())
                    .map(|(ri, rj)| (ri - means[i]) * (rj - means[j]))
                    .sum::<f64>()
                    / periods
                    * TRADING_DAYS;
                covariance[i][j] = cov;
                covariance[j][i] = cov;
            }
        }

        Ok(Self {
            symbols,
            mean_returns,
            covariance,
        })
    }
}

/// Solve `minimize xᵀΣx` subject to `constraintᵀx = 1`, `x ≥ 0`.
fn solve_long_only(covariance: &[Vec<f64>], constraint: &[f64]) -> Result<Vec<f64>> {
    let n = constraint.len();

    let p = csc_from_dense(covariance);
    let q = vec![0.0; n];

    // One equality row followed by the negated identity (−x ≤ 0), in CSC
    // column order.
    let mut a_data = Vec::with_capacity(2 * n);
    let mut a_indices = Vec::with_capacity(2 * n);
    let mut a_indptr = vec![0];
    for (j, &coeff) in constraint.iter().enumerate() {
        a_data.push(coeff);
        a_indices.push(0);
        a_data.push(-1.0);
        a_indices.push(1 + j);
        a_indptr.push(a_data.len());
    }
    let a = CscMatrix::new(1 + n, n, a_indptr, a_indices, a_data);

    let mut b = vec![1.0];
    b.extend(vec![0.0; n]);

    let cones: [SupportedConeT<f64>; 2] = [ZeroConeT(1), NonnegativeConeT(n)];

    let settings = DefaultSettingsBuilder::default()
        .max_iter(100)
        .verbose(false)
        .build()
        .map_err(|e| {
            StrategyError::OptimizationInfeasible(format!("failed to build settings: {}", e))
        })?;

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
        StrategyError::OptimizationInfeasible(format!("failed to create solver: {:?}", e))
    })?;

    solver.solve();

    if !matches!(solver.solution.status, SolverStatus::Solved) {
        return Err(StrategyError::OptimizationInfeasible(format!(
            "solver finished with status {:?}",
            solver.solution.status
        )));
    }

    Ok(solver.solution.x.clone())
}

/// Dense symmetric matrix to clarabel's CSC representation, dropping zeros.
fn csc_from_dense(dense: &[Vec<f64>]) -> CscMatrix {
    let n = dense.len();
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = vec![0];

    for j in 0..n {
        for (i, row) in dense.iter().enumerate() {
            let val = row[j];
            if val.abs() > 1e-10 {
                data.push(val);
                indices.push(i);
            }
        }
        indptr.push(data.len());
    }

    CscMatrix::new(n, n, indptr, indices, data)
}
