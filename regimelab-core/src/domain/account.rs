//! Account state — balances plus the append-only order ledger.

use serde::{Deserialize, Serialize};

use super::action::ActionKind;
use super::order::Order;

/// Balances of a two-asset trading pair and the orders that produced them.
///
/// Strategies only ever see `&Account`. Balances and the ledger change through
/// the replay harness's execution step, which appends one [`Order`] per
/// executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pair: String,
    balance_a: f64,
    balance_b: f64,
    orders: Vec<Order>,
}

impl Account {
    pub fn new(pair: impl Into<String>, balance_a: f64, balance_b: f64) -> Self {
        Self {
            pair: pair.into(),
            balance_a,
            balance_b,
            orders: Vec::new(),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Base-asset quantity.
    pub fn balance_a(&self) -> f64 {
        self.balance_a
    }

    /// Quote-asset quantity.
    pub fn balance_b(&self) -> f64 {
        self.balance_b
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn last_order(&self) -> Option<&Order> {
        self.orders.last()
    }

    pub fn order_count(&self, kind: ActionKind) -> usize {
        self.orders.iter().filter(|o| o.action == kind).count()
    }

    /// Value of the account in quote units at `price`.
    pub fn value_in_quote(&self, price: f64) -> f64 {
        self.balance_b + self.balance_a * price
    }

    /// Commit the post-trade balances and append the ledger entry.
    pub(crate) fn settle(&mut self, order: Order) {
        self.balance_a = order.balance_a;
        self.balance_b = order.balance_b;
        self.orders.push(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn new_account_has_empty_ledger() {
        let account = Account::new("BTC/USDT", 1.0, 1000.0);
        assert_eq!(account.pair(), "BTC/USDT");
        assert!(account.orders().is_empty());
        assert!(account.last_order().is_none());
    }

    #[test]
    fn settle_updates_balances_and_appends() {
        let mut account = Account::new("BTC/USDT", 1.0, 1000.0);
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        account.settle(Order {
            timestamp: ts,
            pair: "BTC/USDT".into(),
            action: ActionKind::SellMarket,
            price: 100.0,
            amount: 0.5,
            fee: 0.05,
            balance_a: 0.5,
            balance_b: 1049.95,
        });
        assert_eq!(account.balance_a(), 0.5);
        assert_eq!(account.balance_b(), 1049.95);
        assert_eq!(account.order_count(ActionKind::SellMarket), 1);
        assert_eq!(account.order_count(ActionKind::BuyMarket), 0);
    }

    #[test]
    fn value_in_quote() {
        let account = Account::new("ETH/USD", 2.0, 50.0);
        assert!((account.value_in_quote(10.0) - 70.0).abs() < 1e-12);
    }
}
