//! Export — CSV and JSON artifacts for backtests, samples and evaluations.
//!
//! A backtest writes three files into its run directory:
//! - `ledger.csv` — one row per executed order
//! - `metrics.csv` — the merged metrics table, one row per bar
//! - `summary.json` — the [`RunSummary`]
//!
//! Persisted summaries carry a `schema_version`. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use regimelab_core::domain::{Bar, Order};
use regimelab_core::engine::{Metric, MetricsRow};

use crate::evaluator::EvaluationReport;
use crate::runner::{BacktestResult, RunSummary, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_summary_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize run summary")
}

/// Parse a summary, rejecting newer schema versions.
pub fn import_summary_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize run summary")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

pub fn export_evaluation_json(report: &EvaluationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize evaluation report")
}

// ─── CSV ────────────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: timestamp, pair, action, price, amount, fee, balance_a, balance_b
pub fn export_ledger_csv(ledger: &[Order]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "pair",
        "action",
        "price",
        "amount",
        "fee",
        "balance_a",
        "balance_b",
    ])?;
    for o in ledger {
        wtr.write_record([
            &o.timestamp.to_string(),
            &o.pair,
            &o.action.to_string(),
            &o.price.to_string(),
            &o.amount.to_string(),
            &o.fee.to_string(),
            &o.balance_a.to_string(),
            &o.balance_b.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: timestamp followed by every [`Metric`] in declaration order.
pub fn export_metrics_csv(table: &[MetricsRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["timestamp"];
    header.extend(Metric::ALL.iter().map(|m| m.as_str()));
    wtr.write_record(&header)?;
    for row in table {
        let mut record = vec![row.timestamp.to_string()];
        record.extend(Metric::ALL.iter().map(|&m| row.get(m).to_string()));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Price table in the loader's input format.
pub fn export_bars_csv(bars: &[Bar]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for b in bars {
        wtr.write_record([
            b.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: iteration, segment_start, segment_end, then `<metric>_abs` and
/// `<metric>_rel` per tracked metric.
pub fn export_runs_csv(report: &EvaluationReport) -> Result<String> {
    let metrics: Vec<Metric> = report.aggregates.iter().map(|a| a.metric).collect();
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header: Vec<String> = ["iteration", "segment_start", "segment_end"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for m in &metrics {
        header.push(format!("{m}_abs"));
        header.push(format!("{m}_rel"));
    }
    wtr.write_record(&header)?;
    for run in &report.outcomes {
        let mut record = vec![
            run.iteration.to_string(),
            run.segment_start.to_string(),
            run.segment_end.to_string(),
        ];
        for m in &metrics {
            match run.changes.iter().find(|c| c.metric == *m) {
                Some(c) => {
                    record.push(c.absolute.to_string());
                    record.push(c.relative.to_string());
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))
}

fn write(path: PathBuf, contents: &str) -> Result<()> {
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save `ledger.csv`, `metrics.csv` and `summary.json` under
/// `{output_dir}/{pair}_{run_id prefix}/`. Returns the directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let summary = &result.summary;
    let short_id: String = summary.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", summary.pair.replace('/', "-"), short_id));
    create_dir(&run_dir)?;

    write(run_dir.join("ledger.csv"), &export_ledger_csv(&result.replay.ledger)?)?;
    write(
        run_dir.join("metrics.csv"),
        &export_metrics_csv(&result.replay.metrics_table)?,
    )?;
    write(run_dir.join("summary.json"), &export_summary_json(summary)?)?;
    Ok(run_dir)
}

/// Load a summary from an artifact directory.
pub fn load_summary(dir: &Path) -> Result<RunSummary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_summary_json(&json)
}

/// Save `evaluation.json` and `runs.csv` under `output_dir`.
pub fn save_evaluation(report: &EvaluationReport, output_dir: &Path) -> Result<PathBuf> {
    create_dir(output_dir)?;
    write(
        output_dir.join("evaluation.json"),
        &export_evaluation_json(report)?,
    )?;
    write(output_dir.join("runs.csv"), &export_runs_csv(report)?)?;
    Ok(output_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use regimelab_core::domain::ActionKind;

    fn order() -> Order {
        Order {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            pair: "BTC/USDT".into(),
            action: ActionKind::BuyMarket,
            price: 100.0,
            amount: 0.5,
            fee: 0.0005,
            balance_a: 1.4995,
            balance_b: 950.0,
        }
    }

    #[test]
    fn ledger_csv_layout() {
        let csv = export_ledger_csv(&[order()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,pair,action,price,amount,fee,balance_a,balance_b")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-05-01 09:00:00,BTC/USDT,BUY_MARKET,100,0.5"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn metrics_csv_has_every_column() {
        let csv = export_metrics_csv(&[]).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(header.split(',').count(), 1 + Metric::ALL.len());
        assert!(header.contains("adjusted_balance_b"));
    }

    #[test]
    fn newer_schema_rejected() {
        let summary = RunSummary {
            schema_version: SCHEMA_VERSION + 1,
            run_id: "x".into(),
            strategy: "multi_ma".into(),
            pair: "BTC/USDT".into(),
            start: String::new(),
            end: String::new(),
            bar_count: 0,
            steps: 0,
            order_count: 0,
            rejected_actions: 0,
            initial_balance_a: 1.0,
            initial_balance_b: 1.0,
            final_balance_a: 1.0,
            final_balance_b: 1.0,
            dataset_hash: String::new(),
            changes: Vec::new(),
        };
        let json = export_summary_json(&summary).unwrap();
        assert!(import_summary_json(&json).is_err());

        let current = RunSummary {
            schema_version: SCHEMA_VERSION,
            ..summary
        };
        let json = export_summary_json(&current).unwrap();
        assert_eq!(import_summary_json(&json).unwrap(), current);
    }
}
