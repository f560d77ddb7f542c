//! Position sizing shared by the phase and momentum strategies.

use serde::{Deserialize, Serialize};

use super::StrategyError;

/// amount = balance / (max_duration × safety_margin [× price]),
/// floored at `min_purchase / price` to avoid dust trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParams {
    /// Number of legs the balance should last for.
    pub max_duration: f64,
    pub safety_margin: f64,
    /// Minimum trade value in quote units.
    pub min_purchase: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            max_duration: 10.0,
            safety_margin: 2.0,
            min_purchase: 10.0,
        }
    }
}

impl SizingParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_duration) {
            return Err(StrategyError::InvalidParams(
                "max_duration must be positive".into(),
            ));
        }
        if !positive(self.safety_margin) {
            return Err(StrategyError::InvalidParams(
                "safety_margin must be positive".into(),
            ));
        }
        if !self.min_purchase.is_finite() || self.min_purchase < 0.0 {
            return Err(StrategyError::InvalidParams(
                "min_purchase must be non-negative".into(),
            ));
        }
        Ok(())
    }

    fn floor(&self, amount: f64, price: f64) -> f64 {
        amount.max(self.min_purchase / price)
    }

    /// Base-asset amount to sell, sized from the base balance.
    pub fn base_amount(&self, balance_a: f64, price: f64) -> f64 {
        self.floor(
            balance_a / (self.max_duration * self.safety_margin),
            price,
        )
    }

    /// Base-asset amount to buy, sized from the quote balance.
    pub fn quote_amount(&self, balance_b: f64, price: f64) -> f64 {
        self.floor(
            balance_b / (self.max_duration * self.safety_margin * price),
            price,
        )
    }
}
