//! Open trend-following position with partial exits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::action::Side;

/// Remaining amounts below this are treated as a closed position.
pub const POSITION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionDirection {
    /// Bought base asset, exits by selling.
    Long,
    /// Sold base asset, exits by buying back.
    Short,
}

/// A partially-liquidatable position.
///
/// Invariant: `remaining_amount` never increases and never exceeds
/// `initial_amount`. Each exit level is consumed at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    direction: PositionDirection,
    entry_price: f64,
    initial_amount: f64,
    remaining_amount: f64,
    consumed_levels: BTreeSet<usize>,
}

impl Position {
    pub fn open(direction: PositionDirection, entry_price: f64, amount: f64) -> Self {
        Self {
            direction,
            entry_price,
            initial_amount: amount,
            remaining_amount: amount,
            consumed_levels: BTreeSet::new(),
        }
    }

    pub fn direction(&self) -> PositionDirection {
        self.direction
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn initial_amount(&self) -> f64 {
        self.initial_amount
    }

    pub fn remaining_amount(&self) -> f64 {
        self.remaining_amount
    }

    pub fn consumed_levels(&self) -> &BTreeSet<usize> {
        &self.consumed_levels
    }

    pub fn is_closed(&self) -> bool {
        self.remaining_amount < POSITION_EPSILON
    }

    pub fn is_consumed(&self, level: usize) -> bool {
        self.consumed_levels.contains(&level)
    }

    /// Side of the trade that reduces this position.
    pub fn exit_side(&self) -> Side {
        match self.direction {
            PositionDirection::Long => Side::Sell,
            PositionDirection::Short => Side::Buy,
        }
    }

    /// Whether exiting at `level_price` would realize a profit.
    pub fn in_profit_at(&self, level_price: f64) -> bool {
        match self.direction {
            PositionDirection::Long => level_price > self.entry_price,
            PositionDirection::Short => level_price < self.entry_price,
        }
    }

    /// Consume `level` and reduce the position by up to `amount`.
    ///
    /// Returns the amount actually released. A residue below
    /// [`POSITION_EPSILON`] is swept into the exit so the position closes
    /// cleanly. Already-consumed levels release nothing.
    pub fn take_partial(&mut self, level: usize, amount: f64) -> f64 {
        if !self.consumed_levels.insert(level) {
            return 0.0;
        }
        let mut released = amount.max(0.0).min(self.remaining_amount);
        if self.remaining_amount - released < POSITION_EPSILON {
            released = self.remaining_amount;
        }
        self.remaining_amount -= released;
        released
    }

    /// Release everything that remains.
    pub fn liquidate(&mut self) -> f64 {
        let released = self.remaining_amount;
        self.remaining_amount = 0.0;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_exits_never_exceed_initial() {
        let mut pos = Position::open(PositionDirection::Long, 100.0, 3.0);
        let mut total = 0.0;
        total += pos.take_partial(0, 2.0);
        total += pos.take_partial(1, 2.0);
        total += pos.take_partial(2, 2.0);
        assert!((total - 3.0).abs() < 1e-12);
        assert!(pos.is_closed());
    }

    #[test]
    fn level_consumed_once() {
        let mut pos = Position::open(PositionDirection::Long, 100.0, 3.0);
        assert!((pos.take_partial(0, 1.0) - 1.0).abs() < 1e-12);
        assert_eq!(pos.take_partial(0, 1.0), 0.0);
        assert!(pos.is_consumed(0));
        assert!((pos.remaining_amount() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn dust_is_swept() {
        let mut pos = Position::open(PositionDirection::Short, 100.0, 1.0);
        let released = pos.take_partial(0, 1.0 - 1e-12);
        assert_eq!(released, 1.0);
        assert!(pos.is_closed());
    }

    #[test]
    fn liquidate_releases_remaining() {
        let mut pos = Position::open(PositionDirection::Long, 100.0, 4.0);
        pos.take_partial(0, 1.0);
        assert!((pos.liquidate() - 3.0).abs() < 1e-12);
        assert!(pos.is_closed());
    }

    #[test]
    fn profit_direction() {
        let long = Position::open(PositionDirection::Long, 100.0, 1.0);
        assert!(long.in_profit_at(101.0));
        assert!(!long.in_profit_at(100.0));
        assert_eq!(long.exit_side(), Side::Sell);

        let short = Position::open(PositionDirection::Short, 100.0, 1.0);
        assert!(short.in_profit_at(99.0));
        assert!(!short.in_profit_at(101.0));
        assert_eq!(short.exit_side(), Side::Buy);
    }
}
