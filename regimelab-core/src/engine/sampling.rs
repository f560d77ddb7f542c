//! Randomized selection of historical segments with a target price move.
//!
//! A segment of `duration` bars is accepted when
//! `|(close[end] − close[start]) / close[start] − target| <= tolerance`.
//! Draws are uniform over all start positions and bounded by `max_attempts`.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::cancel::CancelToken;
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("invalid sampling configuration: {0}")]
    InvalidConfig(String),
    #[error("price table has {bars} bars, fewer than the segment duration {duration}")]
    TableTooShort { bars: usize, duration: usize },
    #[error(
        "no segment within {tolerance} of variation {target} after {attempts} attempts"
    )]
    NoMatchingSegment {
        attempts: usize,
        target: f64,
        tolerance: f64,
    },
    #[error("sampling cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Segment length in bars.
    pub duration: usize,
    /// Target fractional change, e.g. 0.10 for +10%.
    pub target_variation: f64,
    pub tolerance: f64,
    pub max_attempts: usize,
    /// Rescale prices by the segment's maximum close.
    pub normalize: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            duration: 100,
            target_variation: 0.0,
            tolerance: 0.05,
            max_attempts: 10_000,
            normalize: false,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.duration < 2 {
            return Err(SamplingError::InvalidConfig(
                "duration must be >= 2".into(),
            ));
        }
        if !self.target_variation.is_finite() {
            return Err(SamplingError::InvalidConfig(
                "target_variation must be finite".into(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SamplingError::InvalidConfig(
                "tolerance must be non-negative".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SamplingError::InvalidConfig(
                "max_attempts must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// An accepted segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Index of the first bar in the source table.
    pub start: usize,
    /// Index of the last bar in the source table (inclusive).
    pub end: usize,
    pub variation: f64,
    /// Draws used, including the accepted one.
    pub attempts: usize,
    pub bars: Vec<Bar>,
}

impl Segment {
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }
}

/// Fractional close-to-close change from the first to the last bar.
pub fn variation(bars: &[Bar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (last.close - first.close) / first.close,
        _ => f64::NAN,
    }
}

/// Divide open/high/low/close by the maximum close. Volume is untouched.
pub fn normalize(bars: &[Bar]) -> Vec<Bar> {
    let max_close = bars.iter().map(|b| b.close).fold(f64::NAN, f64::max);
    if !(max_close.is_finite() && max_close > 0.0) {
        return bars.to_vec();
    }
    bars.iter().map(|b| b.scaled(max_close)).collect()
}

/// Bars with `start <= timestamp <= end`. Either bound may be open.
pub fn trim(bars: &[Bar], start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> &[Bar] {
    let from = start.map_or(0, |s| bars.partition_point(|b| b.timestamp < s));
    let to = end.map_or(bars.len(), |e| bars.partition_point(|b| b.timestamp <= e));
    if from >= to {
        &[]
    } else {
        &bars[from..to]
    }
}

#[derive(Debug, Clone)]
pub struct SegmentSampler {
    config: SamplingConfig,
    cancel: Option<CancelToken>,
}

impl SegmentSampler {
    pub fn new(config: SamplingConfig) -> Result<Self, SamplingError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Draw segments from `bars` until one matches the target variation.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        bars: &[Bar],
        rng: &mut R,
    ) -> Result<Segment, SamplingError> {
        let duration = self.config.duration;
        if bars.len() < duration {
            return Err(SamplingError::TableTooShort {
                bars: bars.len(),
                duration,
            });
        }
        let last_start = bars.len() - duration;

        for attempt in 1..=self.config.max_attempts {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(SamplingError::Cancelled);
            }
            let start = rng.gen_range(0..=last_start);
            let end = start + duration - 1;
            let slice = &bars[start..=end];
            let v = variation(slice);
            if (v - self.config.target_variation).abs() <= self.config.tolerance {
                tracing::debug!(start, end, variation = v, attempt, "segment accepted");
                let bars = if self.config.normalize {
                    normalize(slice)
                } else {
                    slice.to_vec()
                };
                return Ok(Segment {
                    start,
                    end,
                    variation: v,
                    attempts: attempt,
                    bars,
                });
            }
        }

        Err(SamplingError::NoMatchingSegment {
            attempts: self.config.max_attempts,
            target: self.config.target_variation,
            tolerance: self.config.tolerance,
        })
    }
}
