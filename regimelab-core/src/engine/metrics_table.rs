//! Ledger merged onto the price table.
//!
//! Balances are carried forward between trade events; bars before the first
//! trade carry the initial balances. When several orders share a timestamp
//! the last one wins.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Bar, Order};

/// One row per price bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub balance_a: f64,
    pub balance_b: f64,
    /// balance_a × close
    pub hold_value: f64,
    /// balance_a + balance_b / close
    pub total_value_a: f64,
    /// balance_b + hold_value
    pub total_value_b: f64,
    /// balance_a + (balance_b − b₀) / close
    pub adjusted_balance_a: f64,
    /// balance_b + (balance_a − a₀) × close
    pub adjusted_balance_b: f64,
}

/// Column selector for metrics rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Close,
    BalanceA,
    BalanceB,
    HoldValue,
    TotalValueA,
    TotalValueB,
    AdjustedBalanceA,
    AdjustedBalanceB,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Close,
        Metric::BalanceA,
        Metric::BalanceB,
        Metric::HoldValue,
        Metric::TotalValueA,
        Metric::TotalValueB,
        Metric::AdjustedBalanceA,
        Metric::AdjustedBalanceB,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Close => "close",
            Metric::BalanceA => "balance_a",
            Metric::BalanceB => "balance_b",
            Metric::HoldValue => "hold_value",
            Metric::TotalValueA => "total_value_a",
            Metric::TotalValueB => "total_value_b",
            Metric::AdjustedBalanceA => "adjusted_balance_a",
            Metric::AdjustedBalanceB => "adjusted_balance_b",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricsRow {
    fn new(bar: &Bar, balance_a: f64, balance_b: f64, initial: (f64, f64)) -> Self {
        let close = bar.close;
        let hold_value = balance_a * close;
        Self {
            timestamp: bar.timestamp,
            close,
            balance_a,
            balance_b,
            hold_value,
            total_value_a: balance_a + balance_b / close,
            total_value_b: balance_b + hold_value,
            adjusted_balance_a: balance_a + (balance_b - initial.1) / close,
            adjusted_balance_b: balance_b + (balance_a - initial.0) * close,
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Close => self.close,
            Metric::BalanceA => self.balance_a,
            Metric::BalanceB => self.balance_b,
            Metric::HoldValue => self.hold_value,
            Metric::TotalValueA => self.total_value_a,
            Metric::TotalValueB => self.total_value_b,
            Metric::AdjustedBalanceA => self.adjusted_balance_a,
            Metric::AdjustedBalanceB => self.adjusted_balance_b,
        }
    }
}

/// Merge `ledger` onto `bars` by timestamp.
///
/// `ledger` must be in timestamp order, as produced by the replay harness.
pub fn build_metrics_table(
    bars: &[Bar],
    ledger: &[Order],
    initial_a: f64,
    initial_b: f64,
) -> Vec<MetricsRow> {
    let mut balances = (initial_a, initial_b);
    let mut orders = ledger.iter().peekable();
    bars.iter()
        .map(|bar| {
            while let Some(order) = orders.next_if(|o| o.timestamp <= bar.timestamp) {
                balances = (order.balance_a, order.balance_b);
            }
            MetricsRow::new(bar, balances.0, balances.1, (initial_a, initial_b))
        })
        .collect()
}
