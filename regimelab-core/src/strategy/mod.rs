//! Strategies — stateful decision units fed one window at a time.
//!
//! A strategy receives the current window of bars (oldest first) and a
//! read-only view of the account, and answers with an ordered list of
//! [`Action`]s. Cross-step state (phase, counters, open position) lives in an
//! explicit state struct per variant and is readable through `state()`.
//! Construction parameters never change after `new`.

pub mod adaptive;
pub mod alignment;
pub mod momentum;
pub mod multi_ma;
pub mod sizing;
pub mod trend;

pub use adaptive::{AdaptivePhaseParams, AdaptivePhaseStrategy};
pub use alignment::{alignment, Alignment};
pub use momentum::{MomentumParams, MomentumSignal, MomentumState, MomentumStrategy};
pub use multi_ma::{MultiMaParams, MultiMovingAverageStrategy, PhaseState};
pub use sizing::SizingParams;
pub use trend::{TrendFollowingParams, TrendFollowingStrategy, TrendState};

use serde::{Deserialize, Serialize};

use crate::domain::{Account, Action, Bar, TradingPhase};
use crate::indicators::{compute_series, IndicatorSeries, Sma};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("invalid strategy parameters: {0}")]
    InvalidParams(String),
    #[error("strategy received an empty window")]
    EmptyWindow,
    #[error("strategy failed: {0}")]
    Execution(String),
}

// ─── Trait ───────────────────────────────────────────────────────────

/// A polymorphic, stateful decision procedure.
///
/// `run` may mutate internal state, so the same window replayed twice through
/// the same instance can yield different actions. Strategies never mutate the
/// account; the replay harness executes the returned actions.
pub trait Strategy: Send {
    /// Human-readable name (e.g., "multi_ma").
    fn name(&self) -> &str;

    /// Bars needed before the strategy can classify anything.
    fn warmup_bars(&self) -> usize;

    /// Decide on the current window.
    fn run(&mut self, window: &[Bar], account: &Account) -> Result<Vec<Action>, StrategyError>;

    /// Indicators over `window` for introspection. Does not touch state.
    fn calculate_indicators(&self, window: &[Bar]) -> Vec<IndicatorSeries>;

    /// Current trading phase, for variants that track one.
    fn phase(&self) -> Option<TradingPhase> {
        None
    }
}

// ─── Factory ─────────────────────────────────────────────────────────

/// Serializable strategy selection, one variant per concrete strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    MultiMovingAverage(MultiMaParams),
    AdaptivePhase(AdaptivePhaseParams),
    TrendFollowing(TrendFollowingParams),
    Momentum(MomentumParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::MultiMovingAverage(MultiMaParams::default())
    }
}

impl StrategyConfig {
    /// Build a fresh strategy instance with empty state.
    pub fn build(&self) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(match self {
            StrategyConfig::MultiMovingAverage(p) => {
                Box::new(MultiMovingAverageStrategy::new(p.clone())?)
            }
            StrategyConfig::AdaptivePhase(p) => Box::new(AdaptivePhaseStrategy::new(p.clone())?),
            StrategyConfig::TrendFollowing(p) => {
                Box::new(TrendFollowingStrategy::new(p.clone())?)
            }
            StrategyConfig::Momentum(p) => Box::new(MomentumStrategy::new(p.clone())?),
        })
    }

    /// Check parameters without building.
    pub fn validate(&self) -> Result<(), StrategyError> {
        self.build().map(|_| ())
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::MultiMovingAverage(_) => "multi_ma",
            StrategyConfig::AdaptivePhase(_) => "adaptive_phase",
            StrategyConfig::TrendFollowing(_) => "trend_following",
            StrategyConfig::Momentum(_) => "momentum",
        }
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────

/// Validate and sort MA windows shortest → longest.
pub(crate) fn sorted_ma_windows(windows: &[usize]) -> Result<Vec<usize>, StrategyError> {
    if windows.is_empty() {
        return Err(StrategyError::InvalidParams(
            "at least one moving-average window is required".into(),
        ));
    }
    let mut sorted = windows.to_vec();
    sorted.sort_unstable();
    if sorted[0] == 0 {
        return Err(StrategyError::InvalidParams(
            "moving-average windows must be >= 1".into(),
        ));
    }
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(StrategyError::InvalidParams(
            "moving-average windows must be distinct".into(),
        ));
    }
    Ok(sorted)
}

/// One SMA series per window, in the given order.
pub(crate) fn ma_series(windows: &[usize], bars: &[Bar]) -> Vec<IndicatorSeries> {
    windows
        .iter()
        .map(|&w| compute_series(&Sma::new(w), bars))
        .collect()
}

/// Value of each series at `index` (NaN when out of range).
pub(crate) fn values_at(series: &[IndicatorSeries], index: usize) -> Vec<f64> {
    series
        .iter()
        .map(|s| s.values.get(index).copied().unwrap_or(f64::NAN))
        .collect()
}

pub(crate) fn require_window(window: &[Bar]) -> Result<&Bar, StrategyError> {
    window.last().ok_or(StrategyError::EmptyWindow)
}
