//! Backtest runner — wires configuration, data, strategy and replay together.
//!
//! Entry points:
//! - `run_single_backtest()`: loads the price table named in the config,
//!   optionally resumes balances from an account store, then runs. Used by CLI.
//! - `run_backtest_from_data()`: takes a pre-loaded table and a starting
//!   account. No I/O. Used by the evaluator and tests.
//! - `sample_segment()`: draws one segment per the `[sampling]` section.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::{Account, Bar};
use regimelab_core::engine::{
    Backtester, CancelToken, EngineError, ReplayResult, SamplingError, Segment, SegmentSampler,
};
use regimelab_core::store::{AccountStore, StoreError};
use regimelab_core::strategy::StrategyError;

use crate::config::{ConfigError, RegimeConfig, RunId};
use crate::data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
use crate::metrics::{metric_changes, MetricChange};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("replay error: {0}")]
    Engine(#[from] EngineError),
    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),
    #[error("account store error: {0}")]
    Store(#[from] StoreError),
    #[error("no price table: set backtest.data_path or pass --data")]
    MissingDataPath,
}

/// Current schema version for persisted summaries.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Serializable headline numbers of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: String,
    pub pair: String,
    pub start: String,
    pub end: String,
    pub bar_count: usize,
    pub steps: usize,
    pub order_count: usize,
    pub rejected_actions: usize,
    pub initial_balance_a: f64,
    pub initial_balance_b: f64,
    pub final_balance_a: f64,
    pub final_balance_b: f64,
    pub dataset_hash: String,
    pub changes: Vec<MetricChange>,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: RunSummary,
    pub replay: ReplayResult,
}

/// Run a backtest on pre-loaded bars, starting from `account`.
pub fn run_backtest_from_data(
    config: &RegimeConfig,
    bars: &[Bar],
    dataset_hash: &str,
    account: Account,
    cancel: Option<&CancelToken>,
) -> Result<BacktestResult, RunError> {
    let mut strategy = config.strategy.build()?;
    let mut backtester = Backtester::new(config.backtest.replay_config())?;
    if let Some(token) = cancel {
        backtester = backtester.with_cancel(token.clone());
    }

    let initial_balance_a = account.balance_a();
    let initial_balance_b = account.balance_b();
    let pair = account.pair().to_string();
    let replay = backtester.run(bars, strategy.as_mut(), account)?;

    let stamp = |bar: Option<&Bar>| bar.map(|b| b.timestamp.to_string()).unwrap_or_default();
    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        strategy: strategy.name().to_string(),
        pair,
        start: stamp(bars.first()),
        end: stamp(bars.last()),
        bar_count: bars.len(),
        steps: replay.steps,
        order_count: replay.ledger.len(),
        rejected_actions: replay.rejected_actions,
        initial_balance_a,
        initial_balance_b,
        final_balance_a: replay.final_account.balance_a(),
        final_balance_b: replay.final_account.balance_b(),
        dataset_hash: dataset_hash.to_string(),
        changes: metric_changes(&replay.metrics_table, &config.evaluation.metrics),
    };
    tracing::info!(
        strategy = %summary.strategy,
        pair = %summary.pair,
        bars = summary.bar_count,
        orders = summary.order_count,
        rejected = summary.rejected_actions,
        "backtest complete"
    );
    Ok(BacktestResult { summary, replay })
}

/// Load the configured price table, honoring the `[backtest]` trim bounds.
pub fn load_configured_bars(
    config: &RegimeConfig,
    override_path: Option<&Path>,
) -> Result<LoadedData, RunError> {
    let path = override_path
        .or(config.backtest.data_path.as_deref())
        .ok_or(RunError::MissingDataPath)?;
    let (start, end) = config.backtest.range()?;
    Ok(load_bars(path, &LoadOptions { start, end })?)
}

/// Starting account: the stored one for the pair if present, else the
/// configured initial balances. The stored ledger is dropped; balances carry.
pub fn starting_account(
    config: &RegimeConfig,
    store: Option<&dyn AccountStore>,
) -> Result<Account, RunError> {
    let pair = &config.backtest.pair;
    if let Some(store) = store {
        if let Some(stored) = store.load(pair)? {
            tracing::info!(
                pair = %pair,
                balance_a = stored.balance_a(),
                balance_b = stored.balance_b(),
                "resuming stored account"
            );
            return Ok(Account::new(
                pair.clone(),
                stored.balance_a(),
                stored.balance_b(),
            ));
        }
    }
    Ok(Account::new(
        pair.clone(),
        config.backtest.initial_balance_a,
        config.backtest.initial_balance_b,
    ))
}

/// Load data, run, and persist the final account when a store is given.
pub fn run_single_backtest(
    config: &RegimeConfig,
    data_path: Option<&Path>,
    store: Option<&dyn AccountStore>,
) -> Result<BacktestResult, RunError> {
    let loaded = load_configured_bars(config, data_path)?;
    let account = starting_account(config, store)?;
    let result = run_backtest_from_data(config, &loaded.bars, &loaded.dataset_hash, account, None)?;
    if let Some(store) = store {
        store.save(&config.backtest.pair, &result.replay.final_account)?;
    }
    Ok(result)
}

/// Draw one segment per the `[sampling]` section.
pub fn sample_segment<R: Rng + ?Sized>(
    config: &RegimeConfig,
    bars: &[Bar],
    rng: &mut R,
) -> Result<Segment, RunError> {
    let sampler = SegmentSampler::new(config.sampling.clone())?;
    Ok(sampler.sample(bars, rng)?)
}
