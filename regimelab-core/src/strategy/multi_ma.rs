//! Multi-moving-average strategy with a fixed trading phase.
//!
//! Trades on alignment edges only: the first step that turns UP sells base,
//! the first step that turns DOWN buys base. Which of those legs *opens* a
//! cycle depends on the phase:
//!
//! | phase        | UP edge (SELL) | DOWN edge (BUY) |
//! |--------------|----------------|-----------------|
//! | ACCUMULATION | opens          | closes          |
//! | DISTRIBUTION | closes         | opens           |
//! | NEUTRAL      | unguarded      | unguarded       |
//!
//! A closing leg is only allowed while the phase's leg counter is positive,
//! so a cycle never closes more legs than it opened.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{
    alignment, ma_series, require_window, sorted_ma_windows, values_at, Alignment, SizingParams,
    Strategy, StrategyError,
};
use crate::domain::{Account, Action, Bar, Regime, TradingPhase};
use crate::indicators::IndicatorSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiMaParams {
    pub ma_windows: Vec<usize>,
    pub phase: TradingPhase,
    pub sizing: SizingParams,
}

impl Default for MultiMaParams {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20],
            phase: TradingPhase::Accumulation,
            sizing: SizingParams::default(),
        }
    }
}

/// Cross-step state of the phase-driven strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase: TradingPhase,
    /// Open SELL legs in ACCUMULATION.
    pub accumulation_length: u32,
    /// Open BUY legs in DISTRIBUTION.
    pub distribution_length: u32,
    pub last_alignment: Alignment,
    /// Rolling regime classifications (adaptive variant only).
    pub regime_buffer: VecDeque<Regime>,
    /// Rolling volumes (adaptive variant only).
    pub volume_buffer: VecDeque<f64>,
}

impl PhaseState {
    pub fn with_phase(phase: TradingPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }
}

/// Apply the edge-triggered phase rules for the current alignment.
pub(crate) fn phase_actions(
    state: &mut PhaseState,
    sizing: &SizingParams,
    current: Alignment,
    price: f64,
    account: &Account,
) -> Vec<Action> {
    let edge = current != state.last_alignment;
    state.last_alignment = current;

    let action = if !edge {
        None
    } else {
        match current {
            Alignment::Up => sell_leg(state, sizing, price, account),
            Alignment::Down => buy_leg(state, sizing, price, account),
            Alignment::Unaligned => None,
        }
    };
    vec![action.unwrap_or(Action::Wait)]
}

fn sell_leg(
    state: &mut PhaseState,
    sizing: &SizingParams,
    price: f64,
    account: &Account,
) -> Option<Action> {
    if state.phase == TradingPhase::Distribution && state.distribution_length == 0 {
        return None;
    }
    let amount = sizing.base_amount(account.balance_a(), price);
    if amount <= 0.0 || amount > account.balance_a() {
        return None;
    }
    match state.phase {
        TradingPhase::Accumulation => state.accumulation_length += 1,
        TradingPhase::Distribution => state.distribution_length -= 1,
        TradingPhase::Neutral => {}
    }
    Some(Action::sell(price, amount))
}

fn buy_leg(
    state: &mut PhaseState,
    sizing: &SizingParams,
    price: f64,
    account: &Account,
) -> Option<Action> {
    if state.phase == TradingPhase::Accumulation && state.accumulation_length == 0 {
        return None;
    }
    let amount = sizing.quote_amount(account.balance_b(), price);
    if amount <= 0.0 || amount * price > account.balance_b() {
        return None;
    }
    match state.phase {
        TradingPhase::Accumulation => state.accumulation_length -= 1,
        TradingPhase::Distribution => state.distribution_length += 1,
        TradingPhase::Neutral => {}
    }
    Some(Action::buy(price, amount))
}

pub struct MultiMovingAverageStrategy {
    ma_windows: Vec<usize>,
    sizing: SizingParams,
    state: PhaseState,
}

impl MultiMovingAverageStrategy {
    pub fn new(params: MultiMaParams) -> Result<Self, StrategyError> {
        params.sizing.validate()?;
        Ok(Self {
            ma_windows: sorted_ma_windows(&params.ma_windows)?,
            sizing: params.sizing,
            state: PhaseState::with_phase(params.phase),
        })
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }
}

impl Strategy for MultiMovingAverageStrategy {
    fn name(&self) -> &str {
        "multi_ma"
    }

    fn warmup_bars(&self) -> usize {
        self.ma_windows.last().copied().unwrap_or(1)
    }

    fn run(&mut self, window: &[Bar], account: &Account) -> Result<Vec<Action>, StrategyError> {
        let bar = require_window(window)?;
        let series = ma_series(&self.ma_windows, window);
        let current = alignment(bar.close, &values_at(&series, window.len() - 1));
        Ok(phase_actions(
            &mut self.state,
            &self.sizing,
            current,
            bar.close,
            account,
        ))
    }

    fn calculate_indicators(&self, window: &[Bar]) -> Vec<IndicatorSeries> {
        ma_series(&self.ma_windows, window)
    }

    fn phase(&self) -> Option<TradingPhase> {
        Some(self.state.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionKind;
    use crate::indicators::make_bars;

    fn sizing() -> SizingParams {
        SizingParams {
            max_duration: 5.0,
            safety_margin: 2.0,
            min_purchase: 0.0,
        }
    }

    fn strategy(phase: TradingPhase) -> MultiMovingAverageStrategy {
        MultiMovingAverageStrategy::new(MultiMaParams {
            ma_windows: vec![2, 4],
            phase,
            sizing: sizing(),
        })
        .unwrap()
    }

    #[test]
    fn accumulation_up_edge_sells_once() {
        let mut s = strategy(TradingPhase::Accumulation);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let first = s.run(&bars[..5], &account).unwrap();
        assert_eq!(first, vec![Action::sell(5.0, 1.0)]);
        assert_eq!(s.state().accumulation_length, 1);

        // Still UP: no new edge.
        let second = s.run(&bars, &account).unwrap();
        assert_eq!(second, vec![Action::Wait]);
    }

    #[test]
    fn accumulation_down_edge_without_open_leg_waits() {
        let mut s = strategy(TradingPhase::Accumulation);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        let bars = make_bars(&[6.0, 5.0, 4.0, 3.0, 2.0]);
        let actions = s.run(&bars, &account).unwrap();
        assert_eq!(actions, vec![Action::Wait]);
        assert_eq!(s.state().accumulation_length, 0);
    }

    #[test]
    fn accumulation_cycle_closes_with_buy() {
        let mut s = strategy(TradingPhase::Accumulation);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        s.run(&make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]), &account)
            .unwrap();
        let actions = s
            .run(&make_bars(&[9.0, 8.0, 7.0, 6.0, 5.0]), &account)
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), ActionKind::BuyMarket);
        // 1000 / (5 × 2 × 5) = 20
        assert_eq!(actions[0], Action::buy(5.0, 20.0));
        assert_eq!(s.state().accumulation_length, 0);
    }

    #[test]
    fn distribution_opens_with_buy() {
        let mut s = strategy(TradingPhase::Distribution);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        let actions = s
            .run(&make_bars(&[9.0, 8.0, 7.0, 6.0, 5.0]), &account)
            .unwrap();
        assert_eq!(actions[0].kind(), ActionKind::BuyMarket);
        assert_eq!(s.state().distribution_length, 1);
    }

    #[test]
    fn distribution_up_edge_without_open_leg_waits() {
        let mut s = strategy(TradingPhase::Distribution);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        let actions = s
            .run(&make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]), &account)
            .unwrap();
        assert_eq!(actions, vec![Action::Wait]);
    }

    #[test]
    fn flat_input_waits_in_every_phase() {
        let bars = make_bars(&[100.0; 10]);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        for phase in [
            TradingPhase::Accumulation,
            TradingPhase::Distribution,
            TradingPhase::Neutral,
        ] {
            let mut s = strategy(phase);
            for end in 1..=bars.len() {
                let actions = s.run(&bars[..end], &account).unwrap();
                assert_eq!(actions, vec![Action::Wait]);
            }
        }
    }

    #[test]
    fn sell_skipped_when_balance_does_not_cover() {
        let mut s = MultiMovingAverageStrategy::new(MultiMaParams {
            ma_windows: vec![2, 4],
            phase: TradingPhase::Neutral,
            sizing: SizingParams {
                max_duration: 5.0,
                safety_margin: 2.0,
                min_purchase: 100.0,
            },
        })
        .unwrap();
        // floor = 100 / 5 = 20 base units, balance only 1
        let account = Account::new("BTC/USDT", 1.0, 0.0);
        let actions = s
            .run(&make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]), &account)
            .unwrap();
        assert_eq!(actions, vec![Action::Wait]);
    }

    #[test]
    fn empty_window_is_an_error() {
        let mut s = strategy(TradingPhase::Neutral);
        let account = Account::new("BTC/USDT", 1.0, 1.0);
        assert_eq!(s.run(&[], &account), Err(StrategyError::EmptyWindow));
    }

    #[test]
    fn indicators_match_windows() {
        let s = strategy(TradingPhase::Neutral);
        let series = s.calculate_indicators(&make_bars(&[1.0, 2.0, 3.0, 4.0]));
        let names: Vec<_> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sma_2", "sma_4"]);
        assert_eq!(series[0].values.len(), 4);
    }
}
