//! RegimeLab CLI — backtest, sample and evaluate commands.
//!
//! Commands:
//! - `backtest` — replay the configured strategy over a CSV price table
//! - `sample` — draw one segment with the configured price move and write it as CSV
//! - `evaluate` — replay over many sampled segments and report intervals

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use regimelab_core::rng::RngHierarchy;
use regimelab_runner::evaluator::run_evaluation;
use regimelab_runner::export::export_bars_csv;
use regimelab_runner::runner::{load_configured_bars, run_single_backtest, sample_segment};
use regimelab_runner::stats::Interval;
use regimelab_runner::{
    save_artifacts, save_evaluation, BacktestResult, EvaluationReport, JsonAccountStore,
    RegimeConfig,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI — market-regime strategy backtester"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command.
#[derive(Args)]
struct Common {
    /// Path to a TOML config file.
    #[arg(long)]
    config: PathBuf,

    /// Price table CSV. Overrides `backtest.data_path`.
    #[arg(long)]
    data: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the configured strategy over the price table.
    Backtest {
        #[command(flatten)]
        common: Common,

        /// JSON account store; balances resume from and are saved back to it.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output directory for ledger, metrics and summary.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Draw one segment per the `[sampling]` section and write it as CSV.
    Sample {
        #[command(flatten)]
        common: Common,

        /// Seed for the draw. Defaults to `evaluation.seed`.
        #[arg(long)]
        seed: Option<u64>,

        /// Output CSV. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the strategy over many sampled segments.
    Evaluate {
        #[command(flatten)]
        common: Common,

        /// Overrides `evaluation.seed`.
        #[arg(long)]
        seed: Option<u64>,

        /// Overrides `evaluation.runs`.
        #[arg(long)]
        runs: Option<usize>,

        /// Overrides `evaluation.threads` (0 = all cores).
        #[arg(long)]
        threads: Option<usize>,

        /// Output directory for evaluation.json and runs.csv.
        #[arg(long, default_value = "results/evaluation")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backtest {
            common,
            store,
            output_dir,
            json,
        } => run_backtest_cmd(&common, store.as_deref(), &output_dir, json),
        Commands::Sample {
            common,
            seed,
            output,
        } => run_sample_cmd(&common, seed, output.as_deref()),
        Commands::Evaluate {
            common,
            seed,
            runs,
            threads,
            output_dir,
        } => run_evaluate_cmd(&common, seed, runs, threads, &output_dir),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(common: &Common) -> Result<RegimeConfig> {
    let config = RegimeConfig::from_file(&common.config)
        .with_context(|| format!("failed to load config {}", common.config.display()))?;
    Ok(config)
}

// ─── backtest ───────────────────────────────────────────────────────

fn run_backtest_cmd(
    common: &Common,
    store_path: Option<&Path>,
    output_dir: &Path,
    json: bool,
) -> Result<()> {
    let config = load_config(common)?;
    let store = store_path.map(JsonAccountStore::new);
    let store_ref = store
        .as_ref()
        .map(|s| s as &dyn regimelab_core::store::AccountStore);

    let result = run_single_backtest(&config, common.data.as_deref(), store_ref)
        .context("backtest failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.summary).context("failed to encode summary")?
        );
    } else {
        print_summary(&result);
    }

    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    if let Some(store) = &store {
        println!("Account saved to:   {}", store.path().display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", s.strategy);
    println!("Pair:           {}", s.pair);
    println!("Period:         {} to {}", s.start, s.end);
    println!("Bars:           {} ({} steps)", s.bar_count, s.steps);
    println!("Orders:         {}", s.order_count);
    if s.rejected_actions > 0 {
        println!("Rejected:       {}", s.rejected_actions);
    }
    println!();
    println!("--- Balances ---");
    println!(
        "Asset A:        {:.6} -> {:.6}",
        s.initial_balance_a, s.final_balance_a
    );
    println!(
        "Asset B:        {:.2} -> {:.2}",
        s.initial_balance_b, s.final_balance_b
    );
    if !s.changes.is_empty() {
        println!();
        println!("--- Metric changes ---");
        for c in &s.changes {
            println!(
                "{:<20} {:>14.4} -> {:>14.4}  ({:+.2}%)",
                c.metric.as_str(),
                c.first,
                c.last,
                c.relative * 100.0
            );
        }
    }
    println!();
}

// ─── sample ─────────────────────────────────────────────────────────

fn run_sample_cmd(common: &Common, seed: Option<u64>, output: Option<&Path>) -> Result<()> {
    let config = load_config(common)?;
    let loaded = load_configured_bars(&config, common.data.as_deref())?;
    let seed = seed.unwrap_or(config.evaluation.seed);
    let mut rng = RngHierarchy::new(seed).rng_for("sample", 0);

    let segment = sample_segment(&config, &loaded.bars, &mut rng).context("sampling failed")?;
    tracing::info!(
        start = segment.start,
        end = segment.end,
        variation = segment.variation,
        attempts = segment.attempts,
        "segment accepted"
    );

    let csv = export_bars_csv(&segment.bars)?;
    match output {
        Some(path) => {
            std::fs::write(path, csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "Segment [{}..={}] ({:+.2}%) written to {}",
                segment.start,
                segment.end,
                segment.variation * 100.0,
                path.display()
            );
        }
        None => print!("{csv}"),
    }
    Ok(())
}

// ─── evaluate ───────────────────────────────────────────────────────

fn run_evaluate_cmd(
    common: &Common,
    seed: Option<u64>,
    runs: Option<usize>,
    threads: Option<usize>,
    output_dir: &Path,
) -> Result<()> {
    let mut config = load_config(common)?;
    if let Some(seed) = seed {
        config.evaluation.seed = seed;
    }
    if let Some(runs) = runs {
        config.evaluation.runs = runs;
    }
    if let Some(threads) = threads {
        config.evaluation.threads = threads;
    }

    let loaded = load_configured_bars(&config, common.data.as_deref())?;
    let report = run_evaluation(&config, &loaded.bars, None).context("evaluation failed")?;
    print_report(&report);

    let dir = save_evaluation(&report, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());

    if report.success_count() == 0 {
        bail!("all {} runs failed", report.runs_requested);
    }
    Ok(())
}

fn fmt_interval(interval: Option<Interval>, scale: f64) -> String {
    match interval {
        Some(i) => format!("[{:.4}, {:.4}]", i.lower * scale, i.upper * scale),
        None => "n/a".into(),
    }
}

fn print_report(report: &EvaluationReport) {
    println!();
    println!("=== Evaluation ===");
    println!("Seed:           {}", report.seed);
    println!(
        "Runs:           {} ok / {} failed / {} requested",
        report.success_count(),
        report.failure_count(),
        report.runs_requested
    );
    println!("Elapsed:        {:.2}s", report.elapsed_secs);
    for f in report.failures.iter().take(5) {
        println!("  run {} failed: {}", f.iteration, f.error);
    }
    if report.failure_count() > 5 {
        println!("  ... {} more", report.failure_count() - 5);
    }

    let level = report.confidence * 100.0;
    for a in &report.aggregates {
        println!();
        println!("--- {} ---", a.metric);
        println!(
            "Mean change:    {}",
            a.absolute
                .mean
                .map_or_else(|| "n/a".into(), |m| format!("{m:.4}"))
        );
        println!(
            "{level:.0}% CI:         {}",
            fmt_interval(a.absolute.confidence, 1.0)
        );
        println!(
            "{level:.0}% PI:         {}",
            fmt_interval(a.absolute.prediction, 1.0)
        );
        println!(
            "Mean change %:  {}",
            a.relative
                .mean
                .map_or_else(|| "n/a".into(), |m| format!("{:+.2}%", m * 100.0))
        );
        println!(
            "{level:.0}% CI (%):     {}",
            fmt_interval(a.relative.confidence, 100.0)
        );
    }
    println!();
}
