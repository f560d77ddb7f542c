//! Backtesting engine — replay harness and supporting infrastructure.
//!
//! The engine slides a fixed-size window over a validated price table, feeds
//! each window to a strategy, settles the returned actions against the
//! account, and finally merges the ledger onto the price table:
//!
//! 1. Validate the table and configuration
//! 2. For every window: poll cancellation, run the strategy, settle actions
//! 3. Build the metrics table from the ledger

pub mod cancel;
pub mod execution;
pub mod metrics_table;
pub mod replay;
pub mod sampling;

pub use cancel::CancelToken;
pub use execution::{execute_action, BalancePolicy, ExecutionOutcome};
pub use metrics_table::{build_metrics_table, Metric, MetricsRow};
pub use replay::{Backtester, PhasePoint, ReplayConfig, ReplayResult};
pub use sampling::{
    normalize, trim, variation, SamplingConfig, SamplingError, Segment, SegmentSampler,
};

use crate::domain::BarError;
use crate::strategy::StrategyError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid price table: {0}")]
    InvalidData(#[from] BarError),
    #[error("price table has {bars} bars, fewer than the window size {window_size}")]
    InsufficientData { bars: usize, window_size: usize },
    #[error("invalid replay configuration: {0}")]
    InvalidConfig(String),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("replay cancelled")]
    Cancelled,
}
