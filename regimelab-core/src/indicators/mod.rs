//! Indicator library.
//!
//! Indicators are pure functions: a window of bars in, a numeric series out,
//! aligned one-to-one with the input. Positions before the minimum required
//! history are `f64::NAN`. Nothing is cached between calls; strategies
//! recompute over each window they receive.
//!
//! Multi-series indicators (MACD, Bollinger) are exposed as separate named
//! instances per line/band, keeping the single-series `Indicator` trait
//! unchanged.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod velocity;
pub mod volume_sma;

pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::Sma;
pub use stddev::RollingStd;
pub use velocity::{Acceleration, Velocity};
pub use volume_sma::VolumeSma;

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Type tag.
    fn kind(&self) -> IndicatorKind;

    /// Number of leading positions that are NaN because history is missing.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    MovingAverage,
    StandardDeviation,
    ExponentialMovingAverage,
    Rsi,
    Velocity,
    Acceleration,
    Macd,
    Bollinger,
    VolumeSma,
}

/// A computed indicator, as returned by `Strategy::calculate_indicators`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub name: String,
    pub kind: IndicatorKind,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    /// Last value of the series, if any.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Compute `indicator` over `bars`, warning when the window is too short to
/// produce any defined value. The result is still returned (all NaN).
pub fn compute_series(indicator: &dyn Indicator, bars: &[Bar]) -> IndicatorSeries {
    if bars.len() <= indicator.lookback() {
        tracing::warn!(
            indicator = indicator.name(),
            bars = bars.len(),
            lookback = indicator.lookback(),
            "insufficient history, indicator left undefined"
        );
    }
    IndicatorSeries {
        name: indicator.name().to_string(),
        kind: indicator.kind(),
        values: indicator.compute(bars),
    }
}

// ─── Series helpers ─────────────────────────────────────────────────

/// Trailing mean over `window` values. NaN for the first `window - 1`
/// positions and wherever the trailing window contains a NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return result;
    }
    for (i, w) in values.windows(window).enumerate() {
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i + window - 1] = w.iter().sum::<f64>() / window as f64;
    }
    result
}

/// Trailing population standard deviation (divide by `window`).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return result;
    }
    let n = window as f64;
    for (i, w) in values.windows(window).enumerate() {
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = w.iter().sum::<f64>() / n;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        result[i + window - 1] = var.sqrt();
    }
    result
}

/// First difference; position 0 is NaN.
pub fn first_difference(values: &[f64]) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        result[i] = values[i] - values[i - 1];
    }
    result
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let volumes = vec![1000.0; closes.len()];
    make_bars_with_volume(closes, &volumes)
}

/// Like [`make_bars`] but with explicit volumes.
#[cfg(test)]
pub fn make_bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(0.01),
                close,
                volume,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
