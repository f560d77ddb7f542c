//! Fee-aware settlement of actions against an account.
//!
//! BUY:  balance_b −= price × amount; balance_a += amount × (1 − fee)
//! SELL: balance_a −= amount;        balance_b += price × amount × (1 − fee)
//!
//! Limit, stop-loss and take-profit actions settle immediately at their stated
//! price; the replay has no order book. The fee is charged in the asset
//! received and recorded on the order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{Account, Action, Order, Side};

/// What to do when an action needs more balance than the account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Execute anyway; balances may go negative.
    Permissive,
    /// Drop the action.
    #[default]
    Reject,
    /// Shrink the amount to what the balance covers.
    Clip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed(Order),
    /// WAIT, or an action without a usable price/amount.
    Skipped,
    Rejected { reason: String },
}

/// Settle `action` on `account` at `timestamp`.
pub fn execute_action(
    account: &mut Account,
    action: &Action,
    timestamp: NaiveDateTime,
    fee: f64,
    policy: BalancePolicy,
) -> ExecutionOutcome {
    let Some(fill) = action.fill() else {
        return ExecutionOutcome::Skipped;
    };

    let (available, needed) = match fill.side {
        Side::Buy => (account.balance_b(), fill.price * fill.amount),
        Side::Sell => (account.balance_a(), fill.amount),
    };
    let amount = if needed <= available {
        fill.amount
    } else {
        match policy {
            BalancePolicy::Permissive => fill.amount,
            BalancePolicy::Reject => {
                let reason = format!(
                    "{} needs {needed} but only {available} is available",
                    action.kind()
                );
                tracing::debug!(action = %action.kind(), needed, available, "action rejected");
                return ExecutionOutcome::Rejected { reason };
            }
            BalancePolicy::Clip => match fill.side {
                Side::Buy => available.max(0.0) / fill.price,
                Side::Sell => available.max(0.0),
            },
        }
    };
    if amount <= 0.0 {
        tracing::debug!(action = %action.kind(), "action rejected, nothing left to trade");
        return ExecutionOutcome::Rejected {
            reason: format!("{} clipped to zero", action.kind()),
        };
    }

    let (balance_a, balance_b, fee_charged) = match fill.side {
        Side::Buy => {
            let fee_charged = amount * fee;
            (
                account.balance_a() + amount - fee_charged,
                account.balance_b() - fill.price * amount,
                fee_charged,
            )
        }
        Side::Sell => {
            let proceeds = fill.price * amount;
            let fee_charged = proceeds * fee;
            (
                account.balance_a() - amount,
                account.balance_b() + proceeds - fee_charged,
                fee_charged,
            )
        }
    };

    let order = Order {
        timestamp,
        pair: account.pair().to_string(),
        action: action.kind(),
        price: fill.price,
        amount,
        fee: fee_charged,
        balance_a,
        balance_b,
    };
    tracing::debug!(
        action = %order.action,
        price = order.price,
        amount = order.amount,
        fee = order.fee,
        balance_a,
        balance_b,
        "action executed"
    );
    account.settle(order.clone());
    ExecutionOutcome::Executed(order)
}
