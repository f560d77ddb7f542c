//! Ledger entries for executed actions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::action::ActionKind;

/// An executed action, with the account balances that resulted from it.
///
/// Orders are immutable once appended to an [`Account`](super::Account).
/// `fee` is denominated in the asset received: base asset for buys, quote
/// asset for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: NaiveDateTime,
    pub pair: String,
    pub action: ActionKind,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
    pub balance_a: f64,
    pub balance_b: f64,
}
