//! Moving-average alignment.
//!
//! UP when close > MA₁ > MA₂ > … > MAₙ strictly (MAs ordered by increasing
//! window length), DOWN for the strict mirror. Any tie or undefined MA is
//! `Unaligned`.

use serde::{Deserialize, Serialize};

use crate::domain::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Up,
    Down,
    #[default]
    Unaligned,
}

impl Alignment {
    pub fn regime(self) -> Regime {
        match self {
            Alignment::Up => Regime::Bullish,
            Alignment::Down => Regime::Bearish,
            Alignment::Unaligned => Regime::Neutral,
        }
    }

    pub fn is_directional(self) -> bool {
        self != Alignment::Unaligned
    }
}

/// Classify `close` against `mas` (shortest window first).
pub fn alignment(close: f64, mas: &[f64]) -> Alignment {
    if mas.is_empty() || close.is_nan() || mas.iter().any(|m| m.is_nan()) {
        return Alignment::Unaligned;
    }
    let chain = std::iter::once(close).chain(mas.iter().copied());
    let pairs: Vec<(f64, f64)> = chain.clone().zip(chain.skip(1)).collect();
    if pairs.iter().all(|(a, b)| a > b) {
        Alignment::Up
    } else if pairs.iter().all(|(a, b)| a < b) {
        Alignment::Down
    } else {
        Alignment::Unaligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_descending_is_up() {
        assert_eq!(alignment(10.0, &[9.0, 8.0, 7.0]), Alignment::Up);
    }

    #[test]
    fn strict_ascending_is_down() {
        assert_eq!(alignment(6.0, &[7.0, 8.0, 9.0]), Alignment::Down);
    }

    #[test]
    fn ties_never_align() {
        assert_eq!(alignment(10.0, &[9.0, 9.0, 7.0]), Alignment::Unaligned);
        assert_eq!(alignment(9.0, &[9.0, 8.0]), Alignment::Unaligned);
    }

    #[test]
    fn mixed_order_is_unaligned() {
        assert_eq!(alignment(10.0, &[8.0, 9.0]), Alignment::Unaligned);
    }

    #[test]
    fn nan_is_unaligned() {
        assert_eq!(alignment(10.0, &[9.0, f64::NAN]), Alignment::Unaligned);
        assert_eq!(alignment(10.0, &[]), Alignment::Unaligned);
    }

    #[test]
    fn regime_mapping() {
        assert_eq!(Alignment::Up.regime(), Regime::Bullish);
        assert_eq!(Alignment::Down.regime(), Regime::Bearish);
        assert_eq!(Alignment::Unaligned.regime(), Regime::Neutral);
    }
}
