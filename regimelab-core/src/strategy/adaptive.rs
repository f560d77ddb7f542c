//! Adaptive-phase strategy.
//!
//! Trades exactly like [`MultiMovingAverageStrategy`](super::MultiMovingAverageStrategy)
//! but derives its phase from a rolling buffer of regime classifications and
//! volumes:
//!
//! - bullish fraction > threshold and volume trending up → DISTRIBUTION
//! - bearish fraction > threshold and volume trending up → ACCUMULATION
//! - |bullish − bearish| < neutral band → NEUTRAL
//! - otherwise the phase is kept
//!
//! No transition happens until the buffer is full.

use serde::{Deserialize, Serialize};

use super::multi_ma::{phase_actions, PhaseState};
use super::{
    alignment, ma_series, require_window, sorted_ma_windows, values_at, SizingParams, Strategy,
    StrategyError,
};
use crate::domain::{Account, Action, Bar, Regime, TradingPhase};
use crate::indicators::{compute_series, IndicatorSeries, VolumeSma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptivePhaseParams {
    pub ma_windows: Vec<usize>,
    pub sizing: SizingParams,
    /// Capacity of the regime and volume buffers.
    pub buffer_len: usize,
    pub threshold: f64,
    pub neutral_band: f64,
    pub initial_phase: TradingPhase,
}

impl Default for AdaptivePhaseParams {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20],
            sizing: SizingParams::default(),
            buffer_len: 20,
            threshold: 0.6,
            neutral_band: 0.1,
            initial_phase: TradingPhase::Neutral,
        }
    }
}

pub struct AdaptivePhaseStrategy {
    ma_windows: Vec<usize>,
    sizing: SizingParams,
    buffer_len: usize,
    threshold: f64,
    neutral_band: f64,
    state: PhaseState,
}

impl AdaptivePhaseStrategy {
    pub fn new(params: AdaptivePhaseParams) -> Result<Self, StrategyError> {
        params.sizing.validate()?;
        if params.buffer_len < 2 {
            return Err(StrategyError::InvalidParams(
                "buffer_len must be >= 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&params.threshold) {
            return Err(StrategyError::InvalidParams(
                "threshold must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&params.neutral_band) {
            return Err(StrategyError::InvalidParams(
                "neutral_band must be within [0, 1]".into(),
            ));
        }
        Ok(Self {
            ma_windows: sorted_ma_windows(&params.ma_windows)?,
            sizing: params.sizing,
            buffer_len: params.buffer_len,
            threshold: params.threshold,
            neutral_band: params.neutral_band,
            state: PhaseState::with_phase(params.initial_phase),
        })
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    fn observe(&mut self, regime: Regime, volume: f64) {
        let state = &mut self.state;
        state.regime_buffer.push_back(regime);
        state.volume_buffer.push_back(volume);
        while state.regime_buffer.len() > self.buffer_len {
            state.regime_buffer.pop_front();
        }
        while state.volume_buffer.len() > self.buffer_len {
            state.volume_buffer.pop_front();
        }
        if state.regime_buffer.len() < self.buffer_len {
            return;
        }

        let n = state.regime_buffer.len() as f64;
        let bullish = state
            .regime_buffer
            .iter()
            .filter(|r| **r == Regime::Bullish)
            .count() as f64
            / n;
        let bearish = state
            .regime_buffer
            .iter()
            .filter(|r| **r == Regime::Bearish)
            .count() as f64
            / n;
        let volume_up = volume_trending_up(state.volume_buffer.make_contiguous());

        let next = if bullish > self.threshold && volume_up {
            TradingPhase::Distribution
        } else if bearish > self.threshold && volume_up {
            TradingPhase::Accumulation
        } else if (bullish - bearish).abs() < self.neutral_band {
            TradingPhase::Neutral
        } else {
            state.phase
        };
        if next != state.phase {
            tracing::debug!(from = %state.phase, to = %next, bullish, bearish, "phase transition");
            state.phase = next;
        }
    }
}

/// Mean of the later half exceeds the mean of the earlier half.
fn volume_trending_up(volumes: &[f64]) -> bool {
    let half = volumes.len() / 2;
    if half == 0 {
        return false;
    }
    let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
    mean(&volumes[volumes.len() - half..]) > mean(&volumes[..half])
}

impl Strategy for AdaptivePhaseStrategy {
    fn name(&self) -> &str {
        "adaptive_phase"
    }

    fn warmup_bars(&self) -> usize {
        self.ma_windows.last().copied().unwrap_or(1)
    }

    fn run(&mut self, window: &[Bar], account: &Account) -> Result<Vec<Action>, StrategyError> {
        let bar = require_window(window)?;
        let series = ma_series(&self.ma_windows, window);
        let current = alignment(bar.close, &values_at(&series, window.len() - 1));
        self.observe(current.regime(), bar.volume);
        Ok(phase_actions(
            &mut self.state,
            &self.sizing,
            current,
            bar.close,
            account,
        ))
    }

    fn calculate_indicators(&self, window: &[Bar]) -> Vec<IndicatorSeries> {
        let mut series = ma_series(&self.ma_windows, window);
        series.push(compute_series(&VolumeSma::new(self.buffer_len), window));
        series
    }

    fn phase(&self) -> Option<TradingPhase> {
        Some(self.state.phase)
    }
}
