//! Trend-following strategy with staged partial exits.
//!
//! Entry: on an alignment flip (UP→DOWN or DOWN→UP) while flat, open a
//! position worth `entry_fraction` of the available balance. DOWN→UP goes
//! long (BUY, quote-sized), UP→DOWN goes short (SELL of base). Unaligned
//! steps between two directional readings do not reset the flip detector.
//!
//! Exit, evaluated every step while a position is open:
//! - price crossing the longest MA against the position liquidates everything
//! - otherwise, among the MAs forming the maximal shortest-first prefix that
//!   is in profit versus the entry price, the first cross of each releases
//!   `initial_amount / prefix_len`, once per MA per position
//!
//! Exits are capped at what the account holds: a long received its base net
//! of fees, so the last exit sells the remainder actually held.

use serde::{Deserialize, Serialize};

use super::{
    alignment, ma_series, require_window, sorted_ma_windows, values_at, Alignment, Strategy,
    StrategyError,
};
use crate::domain::{Account, Action, Bar, Position, PositionDirection, Side, POSITION_EPSILON};
use crate::indicators::IndicatorSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFollowingParams {
    pub ma_windows: Vec<usize>,
    /// Fraction of the available balance committed on entry.
    pub entry_fraction: f64,
}

impl Default for TrendFollowingParams {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20],
            entry_fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    /// Last UP or DOWN reading.
    pub last_direction: Option<Alignment>,
    pub position: Option<Position>,
}

pub struct TrendFollowingStrategy {
    ma_windows: Vec<usize>,
    entry_fraction: f64,
    state: TrendState,
}

/// Which way price moved through a level between two consecutive bars.
fn crossed(direction: PositionDirection, prev: (f64, f64), curr: (f64, f64)) -> bool {
    let (prev_close, prev_ma) = prev;
    let (close, ma) = curr;
    if [prev_close, prev_ma, close, ma].iter().any(|v| v.is_nan()) {
        return false;
    }
    match direction {
        PositionDirection::Long => prev_close >= prev_ma && close < ma,
        PositionDirection::Short => prev_close <= prev_ma && close > ma,
    }
}

/// Balances left for this step's orders, debited as exits are emitted.
struct Budget {
    base: f64,
    quote: f64,
}

impl Budget {
    fn of(account: &Account) -> Self {
        Self {
            base: account.balance_a().max(0.0),
            quote: account.balance_b().max(0.0),
        }
    }

    /// Clamp an exit to the available balance and debit it.
    fn take(&mut self, side: Side, price: f64, amount: f64) -> f64 {
        let amount = match side {
            Side::Sell => amount.min(self.base),
            Side::Buy => amount.min(self.quote / price),
        };
        match side {
            Side::Sell => self.base -= amount,
            Side::Buy => self.quote -= amount * price,
        }
        amount
    }
}

fn exit_action(side: Side, price: f64, amount: f64) -> Action {
    match side {
        Side::Buy => Action::buy(price, amount),
        Side::Sell => Action::sell(price, amount),
    }
}

impl TrendFollowingStrategy {
    pub fn new(params: TrendFollowingParams) -> Result<Self, StrategyError> {
        if !(params.entry_fraction > 0.0 && params.entry_fraction <= 1.0) {
            return Err(StrategyError::InvalidParams(
                "entry_fraction must be within (0, 1]".into(),
            ));
        }
        Ok(Self {
            ma_windows: sorted_ma_windows(&params.ma_windows)?,
            entry_fraction: params.entry_fraction,
            state: TrendState::default(),
        })
    }

    pub fn state(&self) -> &TrendState {
        &self.state
    }

    fn manage_position(
        &mut self,
        window: &[Bar],
        series: &[IndicatorSeries],
        budget: &mut Budget,
    ) -> Vec<Action> {
        let Some(position) = self.state.position.as_mut() else {
            return Vec::new();
        };
        let t = window.len() - 1;
        if t == 0 {
            return Vec::new();
        }
        let close = window[t].close;
        let prev_close = window[t - 1].close;
        let now = values_at(series, t);
        let before = values_at(series, t - 1);
        let direction = position.direction();
        let side = position.exit_side();
        let mut actions = Vec::new();

        let longest = now.len() - 1;
        if crossed(
            direction,
            (prev_close, before[longest]),
            (close, now[longest]),
        ) {
            let amount = budget.take(side, close, position.liquidate());
            tracing::debug!(price = close, amount, "stop-loss on longest moving average");
            if amount > POSITION_EPSILON {
                actions.push(exit_action(side, close, amount));
            }
        } else {
            let prefix_len = now
                .iter()
                .take_while(|ma| !ma.is_nan() && position.in_profit_at(**ma))
                .count();
            for level in 0..prefix_len {
                if position.is_consumed(level)
                    || !crossed(direction, (prev_close, before[level]), (close, now[level]))
                {
                    continue;
                }
                let share = position.initial_amount() / prefix_len as f64;
                let amount = budget.take(side, close, position.take_partial(level, share));
                if amount > POSITION_EPSILON {
                    actions.push(exit_action(side, close, amount));
                }
                if position.is_closed() {
                    break;
                }
            }
        }

        if position.is_closed() {
            self.state.position = None;
        }
        actions
    }

    fn maybe_enter(&mut self, current: Alignment, price: f64, budget: &Budget) -> Option<Action> {
        if !current.is_directional() {
            return None;
        }
        let previous = self.state.last_direction.replace(current);
        let flipped = matches!(previous, Some(p) if p != current);
        if !flipped || self.state.position.is_some() {
            return None;
        }
        let (direction, action, amount) = match current {
            Alignment::Up => {
                let amount = self.entry_fraction * budget.quote / price;
                (PositionDirection::Long, Action::buy(price, amount), amount)
            }
            Alignment::Down => {
                let amount = self.entry_fraction * budget.base;
                (PositionDirection::Short, Action::sell(price, amount), amount)
            }
            Alignment::Unaligned => return None,
        };
        if !(amount.is_finite() && amount > 0.0) {
            return None;
        }
        self.state.position = Some(Position::open(direction, price, amount));
        Some(action)
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        "trend_following"
    }

    fn warmup_bars(&self) -> usize {
        self.ma_windows.last().map(|w| w + 1).unwrap_or(2)
    }

    fn run(&mut self, window: &[Bar], account: &Account) -> Result<Vec<Action>, StrategyError> {
        let bar = require_window(window)?;
        let series = ma_series(&self.ma_windows, window);
        let current = alignment(bar.close, &values_at(&series, window.len() - 1));

        let mut budget = Budget::of(account);
        let mut actions = self.manage_position(window, &series, &mut budget);
        if let Some(entry) = self.maybe_enter(current, bar.close, &budget) {
            actions.push(entry);
        }
        if actions.is_empty() {
            actions.push(Action::Wait);
        }
        Ok(actions)
    }

    fn calculate_indicators(&self, window: &[Bar]) -> Vec<IndicatorSeries> {
        ma_series(&self.ma_windows, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionKind;
    use crate::indicators::make_bars;

    fn strategy(windows: Vec<usize>) -> TrendFollowingStrategy {
        TrendFollowingStrategy::new(TrendFollowingParams {
            ma_windows: windows,
            entry_fraction: 0.1,
        })
        .unwrap()
    }

    fn run_all(s: &mut TrendFollowingStrategy, closes: &[f64]) -> Vec<Vec<Action>> {
        let bars = make_bars(closes);
        let account = Account::new("BTC/USDT", 10.0, 1000.0);
        (1..=bars.len())
            .map(|end| s.run(&bars[..end], &account).unwrap())
            .collect()
    }

    #[test]
    fn down_to_up_flip_opens_long() {
        let mut s = strategy(vec![2, 3]);
        let steps = run_all(&mut s, &[10.0, 9.0, 8.0, 7.0, 9.0, 11.0]);
        let buys: Vec<_> = steps
            .iter()
            .flatten()
            .filter(|a| a.kind() == ActionKind::BuyMarket)
            .collect();
        assert_eq!(buys.len(), 1);
        let position = s.state().position.as_ref().unwrap();
        assert_eq!(position.direction(), PositionDirection::Long);
        // 0.1 × 1000 / 11
        assert!((position.initial_amount() - 100.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn first_directional_reading_is_not_a_flip() {
        let mut s = strategy(vec![2, 3]);
        let steps = run_all(&mut s, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(steps.iter().flatten().all(|a| a.is_wait()));
        assert!(s.state().position.is_none());
    }

    #[test]
    fn up_to_down_flip_opens_short() {
        let mut s = strategy(vec![2, 3]);
        let steps = run_all(&mut s, &[1.0, 2.0, 3.0, 4.0, 2.0, 1.0]);
        let sells: Vec<_> = steps
            .iter()
            .flatten()
            .filter(|a| a.kind() == ActionKind::SellMarket)
            .collect();
        assert_eq!(sells.len(), 1);
        let position = s.state().position.as_ref().unwrap();
        assert_eq!(position.direction(), PositionDirection::Short);
        assert!((position.initial_amount() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn crossing_longest_ma_liquidates_then_reverses() {
        let mut s = strategy(vec![2, 3]);
        // long entry at 11, then a collapse through every MA
        let steps = run_all(&mut s, &[10.0, 9.0, 8.0, 7.0, 9.0, 11.0, 3.0]);
        let last = steps.last().unwrap();
        assert_eq!(last.len(), 2);
        let exit = last[0].fill().unwrap();
        assert_eq!(exit.side, Side::Sell);
        assert!((exit.amount - 100.0 / 11.0).abs() < 1e-9);
        // The same step flips UP→DOWN, so a short opens on the now-flat book.
        let position = s.state().position.as_ref().unwrap();
        assert_eq!(position.direction(), PositionDirection::Short);
    }

    #[test]
    fn budget_caps_exits_at_held_balances() {
        let mut budget = Budget::of(&Account::new("BTC/USDT", 2.0, 50.0));
        assert_eq!(budget.take(Side::Sell, 10.0, 1.5), 1.5);
        assert_eq!(budget.take(Side::Sell, 10.0, 1.5), 0.5);
        assert_eq!(budget.take(Side::Sell, 10.0, 1.0), 0.0);
        // buy-back limited by quote: 50 / 10
        assert_eq!(budget.take(Side::Buy, 10.0, 8.0), 5.0);
        assert_eq!(budget.quote, 0.0);
    }

    #[test]
    fn cross_detection() {
        assert!(crossed(PositionDirection::Long, (10.0, 9.0), (8.0, 9.0)));
        assert!(!crossed(PositionDirection::Long, (8.0, 9.0), (7.0, 9.0)));
        assert!(crossed(PositionDirection::Short, (8.0, 9.0), (10.0, 9.0)));
        assert!(!crossed(PositionDirection::Short, (8.0, f64::NAN), (10.0, 9.0)));
    }
}
