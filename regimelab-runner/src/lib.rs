//! RegimeLab Runner — configuration, data loading, orchestration, evaluation.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML run configuration with validation
//! - CSV price-table loading with timestamp-format detection
//! - Single-backtest runner with account resume and summary
//! - Multi-run evaluator over randomly sampled segments (rayon)
//! - Student-t statistics for confidence and prediction intervals
//! - CSV/JSON export and a JSON-file account store

pub mod account_store;
pub mod config;
pub mod data_loader;
pub mod evaluator;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod stats;

pub use account_store::JsonAccountStore;
pub use config::{BacktestSection, ConfigError, EvaluationConfig, RegimeConfig, RunId};
pub use data_loader::{
    load_bars, parse_timestamp, read_price_table, LoadError, LoadOptions, LoadedData,
};
pub use evaluator::{
    evaluate_with, run_evaluation, EvalError, EvaluationReport, FailedRun, MetricAggregate,
    RunOutcome,
};
pub use export::{save_artifacts, save_evaluation};
pub use metrics::{metric_changes, MetricChange};
pub use runner::{
    load_configured_bars, run_backtest_from_data, run_single_backtest, sample_segment,
    starting_account, BacktestResult, RunError, RunSummary,
};
pub use stats::{Interval, Summary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RegimeConfig>();
        assert_sync::<RegimeConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<RunOutcome>();
        assert_sync::<RunOutcome>();
        assert_send::<EvaluationReport>();
        assert_sync::<EvaluationReport>();
    }

    #[test]
    fn account_store_is_send_sync() {
        assert_send::<JsonAccountStore>();
        assert_sync::<JsonAccountStore>();
    }
}
