//! Multi-run evaluation — repeated backtests on randomly sampled segments.
//!
//! Each run gets its own RNG (derived from the master seed through
//! [`RngHierarchy`]), samples a segment, builds a fresh strategy and replays
//! it from the configured starting balances. Runs fan out over a rayon pool
//! and share nothing mutable. A run that errors or panics is recorded as a
//! failure and does not affect its siblings.
//!
//! Per metric, the first→last absolute and percentage changes of all
//! successful runs are aggregated into mean, sample standard deviation, and
//! Student-t confidence and prediction intervals.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::{Account, Bar};
use regimelab_core::engine::{Backtester, CancelToken, Metric, SegmentSampler};
use regimelab_core::rng::RngHierarchy;
use regimelab_core::strategy::{Strategy, StrategyError};

use crate::config::{ConfigError, RegimeConfig};
use crate::metrics::{metric_changes, MetricChange};
use crate::runner::RunError;
use crate::stats::Summary;

/// RNG label for segment draws.
const SEGMENT_STREAM: &str = "segment";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
    #[error("evaluation cancelled after {completed} of {requested} runs")]
    Cancelled { completed: usize, requested: usize },
}

// ─── Result types ────────────────────────────────────────────────────

/// One successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub iteration: usize,
    pub segment_start: usize,
    pub segment_end: usize,
    pub segment_variation: f64,
    pub sampling_attempts: usize,
    pub order_count: usize,
    pub changes: Vec<MetricChange>,
}

/// One failed run and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRun {
    pub iteration: usize,
    pub error: String,
}

/// Aggregate over one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub metric: Metric,
    pub absolute: Summary,
    pub relative: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub runs_requested: usize,
    pub seed: u64,
    pub confidence: f64,
    pub outcomes: Vec<RunOutcome>,
    pub failures: Vec<FailedRun>,
    pub aggregates: Vec<MetricAggregate>,
    pub elapsed_secs: f64,
}

impl EvaluationReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn aggregate(&self, metric: Metric) -> Option<&MetricAggregate> {
        self.aggregates.iter().find(|a| a.metric == metric)
    }
}

// ─── Core loop ───────────────────────────────────────────────────────

/// Evaluate the configured strategy over `config.evaluation.runs` segments.
pub fn run_evaluation(
    config: &RegimeConfig,
    bars: &[Bar],
    cancel: Option<&CancelToken>,
) -> Result<EvaluationReport, EvalError> {
    evaluate_with(config, bars, cancel, |_| config.strategy.build())
}

/// Same as [`run_evaluation`] with an explicit strategy factory, called once
/// per run with the run's iteration index.
pub fn evaluate_with<F>(
    config: &RegimeConfig,
    bars: &[Bar],
    cancel: Option<&CancelToken>,
    make_strategy: F,
) -> Result<EvaluationReport, EvalError>
where
    F: Fn(usize) -> Result<Box<dyn Strategy>, StrategyError> + Sync,
{
    config.validate()?;
    let eval = &config.evaluation;
    let start_time = Instant::now();
    let rng_hierarchy = RngHierarchy::new(eval.seed);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(eval.threads)
        .build()
        .map_err(|e| EvalError::ThreadPool(e.to_string()))?;

    tracing::info!(
        runs = eval.runs,
        seed = eval.seed,
        threads = pool.current_num_threads(),
        strategy = config.strategy.name(),
        "starting evaluation"
    );

    let results: Vec<Option<Result<RunOutcome, String>>> = pool.install(|| {
        (0..eval.runs)
            .into_par_iter()
            .map(|iteration| {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return None;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    single_run(config, bars, &rng_hierarchy, iteration, cancel, &make_strategy)
                }));
                Some(match outcome {
                    Ok(Ok(run)) => Ok(run),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                })
            })
            .collect()
    });

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(EvalError::Cancelled {
            completed: results.iter().filter(|r| matches!(r, Some(Ok(_)))).count(),
            requested: eval.runs,
        });
    }

    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    for (iteration, result) in results.into_iter().flatten().enumerate() {
        match result {
            Ok(run) => outcomes.push(run),
            Err(error) => {
                tracing::warn!(iteration, %error, "evaluation run failed");
                failures.push(FailedRun { iteration, error });
            }
        }
    }

    let aggregates = aggregate(&outcomes, &eval.metrics, eval.confidence);
    let report = EvaluationReport {
        runs_requested: eval.runs,
        seed: eval.seed,
        confidence: eval.confidence,
        outcomes,
        failures,
        aggregates,
        elapsed_secs: start_time.elapsed().as_secs_f64(),
    };
    tracing::info!(
        succeeded = report.success_count(),
        failed = report.failure_count(),
        elapsed_secs = report.elapsed_secs,
        "evaluation complete"
    );
    Ok(report)
}

fn single_run<F>(
    config: &RegimeConfig,
    bars: &[Bar],
    rng_hierarchy: &RngHierarchy,
    iteration: usize,
    cancel: Option<&CancelToken>,
    make_strategy: &F,
) -> Result<RunOutcome, RunError>
where
    F: Fn(usize) -> Result<Box<dyn Strategy>, StrategyError>,
{
    let mut rng = rng_hierarchy.rng_for(SEGMENT_STREAM, iteration as u64);
    let mut sampler = SegmentSampler::new(config.sampling.clone())?;
    let mut backtester = Backtester::new(config.backtest.replay_config())?;
    if let Some(token) = cancel {
        sampler = sampler.with_cancel(token.clone());
        backtester = backtester.with_cancel(token.clone());
    }

    let segment = sampler.sample(bars, &mut rng)?;
    let mut strategy = make_strategy(iteration)?;
    let account = Account::new(
        config.backtest.pair.clone(),
        config.backtest.initial_balance_a,
        config.backtest.initial_balance_b,
    );
    let replay = backtester.run(&segment.bars, strategy.as_mut(), account)?;

    Ok(RunOutcome {
        iteration,
        segment_start: segment.start,
        segment_end: segment.end,
        segment_variation: segment.variation,
        sampling_attempts: segment.attempts,
        order_count: replay.ledger.len(),
        changes: metric_changes(&replay.metrics_table, &config.evaluation.metrics),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".into());
    format!("panic: {detail}")
}

/// Per-metric summaries over successful runs.
pub fn aggregate(outcomes: &[RunOutcome], metrics: &[Metric], level: f64) -> Vec<MetricAggregate> {
    metrics
        .iter()
        .map(|&metric| {
            let (absolute, relative): (Vec<f64>, Vec<f64>) = outcomes
                .iter()
                .filter_map(|o| o.changes.iter().find(|c| c.metric == metric))
                .map(|c| (c.absolute, c.relative))
                .unzip();
            MetricAggregate {
                metric,
                absolute: Summary::from_values(&absolute, level),
                relative: Summary::from_values(&relative, level),
            }
        })
        .collect()
}
