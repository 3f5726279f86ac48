//! Rolling close-price history for the instrument universe.
//!
//! Each instrument owns one append-only series of daily closes, indexed by
//! simulation day. The [`PriceTable`] keeps every series aligned (one close
//! per instrument per day) and produces the day-major matrix consumed by the
//! optimizer.

use crate::error::{Result, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum number of observations required to estimate a covariance matrix.
pub const MIN_OBSERVATIONS: usize = 2;

/// Append-only close-price series for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    symbol: String,
    closes: Vec<f64>,
}

impl PriceHistory {
    /// Create an empty history for a symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            closes: Vec::new(),
        }
    }

    /// Append a close for the given simulation day.
    ///
    /// Days must arrive strictly in order with no gaps; anything else is a
    /// data-feed fault.
    pub fn append(&mut self, day_index: usize, close: f64) -> Result<()> {
        if day_index != self.closes.len() {
            return Err(StrategyError::InvalidSequence {
                symbol: self.symbol.clone(),
                expected: self.closes.len(),
                got: day_index,
            });
        }
        if !close.is_finite() || close <= 0.0 {
            return Err(StrategyError::InvalidInput(format!(
                "non-positive close {} for {} on day {}",
                close, self.symbol, day_index
            )));
        }
        self.closes.push(close);
        Ok(())
    }

    /// Symbol this series belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of days recorded.
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// Whether no days have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// All recorded closes, oldest first.
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }
}

/// Aligned day-major price matrix: rows are days, columns are instruments.
#[derive(Debug, Clone)]
pub struct PriceMatrix {
    symbols: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Column order of the matrix (sorted symbol order).
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of days (rows).
    pub fn days(&self) -> usize {
        self.rows.len()
    }

    /// Day-major rows, oldest first.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Close series for one column.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }
}

/// Aligned store of every instrument's price history.
///
/// The equal-length invariant across instruments is structural: closes enter
/// one whole day at a time through [`PriceTable::push_day`].
#[derive(Debug, Clone)]
pub struct PriceTable {
    series: BTreeMap<String, PriceHistory>,
    days: usize,
}

impl PriceTable {
    /// Create a table tracking the given symbols.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let series = symbols
            .into_iter()
            .map(|s| {
                let symbol = s.into();
                let history = PriceHistory::new(symbol.clone());
                (symbol, history)
            })
            .collect();
        Self { series, days: 0 }
    }

    /// Append one close per instrument for the next simulation day.
    ///
    /// Every tracked symbol must be present with a usable close. The whole
    /// day is validated before any series is touched, so a rejected day
    /// leaves the table exactly as it was and later days still append.
    pub fn push_day(&mut self, closes: &BTreeMap<String, f64>) -> Result<()> {
        for symbol in self.series.keys() {
            let close = closes.get(symbol).ok_or_else(|| {
                StrategyError::InvalidInput(format!(
                    "missing close for {} on day {}",
                    symbol, self.days
                ))
            })?;
            if !close.is_finite() || *close <= 0.0 {
                return Err(StrategyError::InvalidInput(format!(
                    "non-positive close {} for {} on day {}",
                    close, symbol, self.days
                )));
            }
        }
        let day = self.days;
        for (symbol, history) in self.series.iter_mut() {
            history.append(day, closes[symbol])?;
        }
        self.days += 1;
        Ok(())
    }

    /// Symbols tracked by this table, in column order.
    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    /// Number of days recorded so far.
    pub fn days(&self) -> usize {
        self.days
    }

    /// History for one symbol, if tracked.
    pub fn history(&self, symbol: &str) -> Option<&PriceHistory> {
        self.series.get(symbol)
    }

    /// Build the aligned matrix of the first `upto_day` days.
    pub fn matrix(&self, upto_day: usize) -> Result<PriceMatrix> {
        if upto_day < MIN_OBSERVATIONS {
            return Err(StrategyError::InsufficientHistory {
                have: upto_day,
                need: MIN_OBSERVATIONS,
            });
        }
        if upto_day > self.days {
            return Err(StrategyError::InsufficientHistory {
                have: self.days,
                need: upto_day,
            });
        }

        let symbols = self.symbols();
        let mut rows = Vec::with_capacity(upto_day);
        for day in 0..upto_day {
            let row = symbols
                .iter()
                .map(|s| self.series[s].closes()[day])
                .collect();
            rows.push(row);
        }

        Ok(PriceMatrix { symbols, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_in_order() {
        let mut history = PriceHistory::new("AGG");
        history.append(0, 100.0).unwrap();
        history.append(1, 101.5).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.closes(), &[100.0, 101.5]);
    }

    #[test]
    fn test_append_out_of_order() {
        let mut history = PriceHistory::new("AGG");
        history.append(0, 100.0).unwrap();

        let err = history.append(2, 101.0).unwrap_err();
        match err {
            StrategyError::InvalidSequence {
                expected, got, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(got, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_append_rejects_bad_close() {
        let mut history = PriceHistory::new("AGG");
        assert!(history.append(0, 0.0).is_err());
        assert!(history.append(0, f64::NAN).is_err());
        assert!(history.append(0, 100.0).is_ok());
    }

    fn day(values: &[(&str, f64)]) -> BTreeMap<String, f64> {
        values
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect()
    }

    #[test]
    fn test_table_alignment() {
        let mut table = PriceTable::new(["IEMG", "AGG"]);
        table
            .push_day(&day(&[("AGG", 100.0), ("IEMG", 50.0)]))
            .unwrap();
        table
            .push_day(&day(&[("AGG", 101.0), ("IEMG", 51.0)]))
            .unwrap();

        assert_eq!(table.days(), 2);
        assert_eq!(table.history("AGG").unwrap().len(), 2);
        assert_eq!(table.history("IEMG").unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_close_leaves_table_unchanged() {
        let mut table = PriceTable::new(["AAA", "BBB"]);

        // BBB's close is invalid; AAA sorts first but must not gain a day.
        let err = table
            .push_day(&day(&[("AAA", 100.0), ("BBB", -5.0)]))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidInput(_)));
        assert_eq!(table.days(), 0);
        assert_eq!(table.history("AAA").unwrap().len(), 0);
        assert_eq!(table.history("BBB").unwrap().len(), 0);

        // A bad day does not poison the feed: the next valid day appends.
        table
            .push_day(&day(&[("AAA", 100.0), ("BBB", 20.0)]))
            .unwrap();
        assert_eq!(table.days(), 1);
        assert_eq!(table.history("AAA").unwrap().len(), 1);
    }

    #[test]
    fn test_table_missing_close() {
        let mut table = PriceTable::new(["AGG", "IEMG"]);
        let err = table.push_day(&day(&[("AGG", 100.0)])).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidInput(_)));
        // Nothing was appended, so the calendars stay aligned.
        assert_eq!(table.days(), 0);
    }

    #[test]
    fn test_matrix_column_order_is_sorted() {
        let mut table = PriceTable::new(["IEMG", "AGG"]);
        table
            .push_day(&day(&[("AGG", 100.0), ("IEMG", 50.0)]))
            .unwrap();
        table
            .push_day(&day(&[("AGG", 102.0), ("IEMG", 49.0)]))
            .unwrap();

        let matrix = table.matrix(2).unwrap();
        assert_eq!(matrix.symbols(), &["AGG".to_string(), "IEMG".to_string()]);
        assert_eq!(matrix.rows(), &[vec![100.0, 50.0], vec![102.0, 49.0]]);
        assert_eq!(matrix.column(1), vec![50.0, 49.0]);
    }

    #[test]
    fn test_matrix_requires_two_observations() {
        let mut table = PriceTable::new(["AGG"]);
        table.push_day(&day(&[("AGG", 100.0)])).unwrap();

        let err = table.matrix(1).unwrap_err();
        assert!(matches!(err, StrategyError::InsufficientHistory { .. }));

        // Asking past the recorded range is the same fault.
        assert!(table.matrix(5).is_err());
    }
}
