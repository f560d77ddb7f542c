//! First-to-last changes of metrics-table columns.
//!
//! Pure functions: metrics table in, changes out. The evaluator aggregates
//! these across runs; single backtests report them in their summary.

use serde::{Deserialize, Serialize};

use regimelab_core::engine::{Metric, MetricsRow};

/// Change of one column between the first and the last bar of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: Metric,
    pub first: f64,
    pub last: f64,
    /// `last - first`.
    pub absolute: f64,
    /// Fractional change `(last - first) / first`, so 0.05 is +5%. NaN when
    /// `first` is zero or non-finite.
    #[serde(with = "nan_as_null")]
    pub relative: f64,
}

/// JSON has no NaN: write it as `null` and read `null` back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

impl MetricChange {
    pub fn between(metric: Metric, first: &MetricsRow, last: &MetricsRow) -> Self {
        let (a, b) = (first.get(metric), last.get(metric));
        let relative = if a != 0.0 && a.is_finite() {
            (b - a) / a
        } else {
            f64::NAN
        };
        Self {
            metric,
            first: a,
            last: b,
            absolute: b - a,
            relative,
        }
    }
}

/// Changes for every requested metric. Empty for an empty table.
pub fn metric_changes(table: &[MetricsRow], metrics: &[Metric]) -> Vec<MetricChange> {
    match (table.first(), table.last()) {
        (Some(first), Some(last)) => metrics
            .iter()
            .map(|&m| MetricChange::between(m, first, last))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, close: f64, balance_a: f64, balance_b: f64) -> MetricsRow {
        let hold_value = balance_a * close;
        MetricsRow {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            close,
            balance_a,
            balance_b,
            hold_value,
            total_value_a: balance_a + balance_b / close,
            total_value_b: balance_b + hold_value,
            adjusted_balance_a: balance_a,
            adjusted_balance_b: balance_b,
        }
    }

    #[test]
    fn absolute_and_relative() {
        let table = vec![row(1, 100.0, 1.0, 100.0), row(2, 120.0, 1.0, 150.0)];
        let changes = metric_changes(&table, &[Metric::BalanceB, Metric::TotalValueB]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].metric, Metric::BalanceB);
        assert!((changes[0].absolute - 50.0).abs() < 1e-12);
        assert!((changes[0].relative - 0.5).abs() < 1e-12);
        // 200 → 270
        assert!((changes[1].absolute - 70.0).abs() < 1e-12);
        assert!((changes[1].relative - 0.35).abs() < 1e-12);
    }

    #[test]
    fn zero_start_has_undefined_relative() {
        let table = vec![row(1, 100.0, 0.0, 100.0), row(2, 100.0, 2.0, 0.0)];
        let change = metric_changes(&table, &[Metric::BalanceA])[0];
        assert_eq!(change.absolute, 2.0);
        assert!(change.relative.is_nan());
    }

    #[test]
    fn empty_table_has_no_changes() {
        assert!(metric_changes(&[], &Metric::ALL).is_empty());
    }

    #[test]
    fn undefined_relative_survives_json() {
        let table = vec![row(1, 100.0, 0.0, 100.0), row(2, 100.0, 2.0, 0.0)];
        let change = metric_changes(&table, &[Metric::BalanceA])[0];
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"relative\":null"));
        let back: MetricChange = serde_json::from_str(&json).unwrap();
        assert!(back.relative.is_nan());
        assert_eq!(back.absolute, 2.0);
    }
}
