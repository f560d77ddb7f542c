//! Actions — the decisions a strategy hands back to the replay harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a settled trade, from the point of view of the base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Tag identifying an action variant. Recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    BuyMarket,
    SellMarket,
    Wait,
    BuyLimit,
    SellLimit,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::BuyMarket => "BUY_MARKET",
            ActionKind::SellMarket => "SELL_MARKET",
            ActionKind::Wait => "WAIT",
            ActionKind::BuyLimit => "BUY_LIMIT",
            ActionKind::SellLimit => "SELL_LIMIT",
            ActionKind::StopLoss => "STOP_LOSS",
            ActionKind::TakeProfit => "TAKE_PROFIT",
        };
        f.write_str(s)
    }
}

/// A strategy decision.
///
/// `price` is quoted in the quote asset per unit of base asset; `amount` is
/// always a base-asset quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Wait,
    BuyMarket { price: f64, amount: f64 },
    SellMarket { price: f64, amount: f64 },
    BuyLimit { price: f64, amount: f64 },
    SellLimit { price: f64, amount: f64 },
    StopLoss { side: Side, price: f64, amount: f64 },
    TakeProfit { side: Side, price: f64, amount: f64 },
}

/// The settlement parameters of an executable action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub side: Side,
    pub price: f64,
    pub amount: f64,
}

impl Action {
    pub fn buy(price: f64, amount: f64) -> Self {
        Action::BuyMarket { price, amount }
    }

    pub fn sell(price: f64, amount: f64) -> Self {
        Action::SellMarket { price, amount }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Wait => ActionKind::Wait,
            Action::BuyMarket { .. } => ActionKind::BuyMarket,
            Action::SellMarket { .. } => ActionKind::SellMarket,
            Action::BuyLimit { .. } => ActionKind::BuyLimit,
            Action::SellLimit { .. } => ActionKind::SellLimit,
            Action::StopLoss { .. } => ActionKind::StopLoss,
            Action::TakeProfit { .. } => ActionKind::TakeProfit,
        }
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Action::Wait)
    }

    /// Settlement side, price and amount, or `None` when the action has no
    /// balance effect (WAIT, or a price/amount that is not finite and positive).
    pub fn fill(&self) -> Option<Fill> {
        let (side, price, amount) = match *self {
            Action::Wait => return None,
            Action::BuyMarket { price, amount } | Action::BuyLimit { price, amount } => {
                (Side::Buy, price, amount)
            }
            Action::SellMarket { price, amount } | Action::SellLimit { price, amount } => {
                (Side::Sell, price, amount)
            }
            Action::StopLoss {
                side,
                price,
                amount,
            }
            | Action::TakeProfit {
                side,
                price,
                amount,
            } => (side, price, amount),
        };
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if usable(price) && usable(amount) {
            Some(Fill {
                side,
                price,
                amount,
            })
        } else {
            None
        }
    }
}
