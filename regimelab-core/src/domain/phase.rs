//! Trading phases and per-step regime classifications.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which asset a strategy is trying to grow.
///
/// - `Accumulation`: net buying of the base asset; profits are measured in base units.
/// - `Distribution`: net selling of the base asset; profits are measured in quote units.
/// - `Neutral`: no preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingPhase {
    Accumulation,
    Distribution,
    #[default]
    Neutral,
}

impl fmt::Display for TradingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradingPhase::Accumulation => "ACCUMULATION",
            TradingPhase::Distribution => "DISTRIBUTION",
            TradingPhase::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Market regime observed at a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Bullish,
    Bearish,
    Neutral,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_is_neutral() {
        assert_eq!(TradingPhase::default(), TradingPhase::Neutral);
    }

    #[test]
    fn phase_serializes_screaming() {
        let json = serde_json::to_string(&TradingPhase::Accumulation).unwrap();
        assert_eq!(json, "\"ACCUMULATION\"");
        let back: TradingPhase = serde_json::from_str("\"DISTRIBUTION\"").unwrap();
        assert_eq!(back, TradingPhase::Distribution);
    }
}
