//! Bar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a bar or a bar table is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} at {timestamp}: non-positive or non-finite price")]
    InvalidPrice {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("bar {index} at {timestamp}: negative or non-finite volume")]
    InvalidVolume {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("bar {index} at {timestamp} is earlier than its predecessor")]
    Unsorted {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("bar {index} duplicates timestamp {timestamp}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

impl Bar {
    /// Returns true if every price is finite and strictly positive.
    pub fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    /// Returns a copy with all price columns divided by `factor`. Volume is untouched.
    pub fn scaled(&self, factor: f64) -> Bar {
        Bar {
            timestamp: self.timestamp,
            open: self.open / factor,
            high: self.high / factor,
            low: self.low / factor,
            close: self.close / factor,
            volume: self.volume,
        }
    }
}

/// Validate a price table: positive prices, non-negative volume, strictly
/// ascending timestamps.
pub fn validate_table(bars: &[Bar]) -> Result<(), BarError> {
    for (index, bar) in bars.iter().enumerate() {
        if !bar.has_valid_prices() {
            return Err(BarError::InvalidPrice {
                index,
                timestamp: bar.timestamp,
            });
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(BarError::InvalidVolume {
                index,
                timestamp: bar.timestamp,
            });
        }
        if index > 0 {
            let prev = bars[index - 1].timestamp;
            if bar.timestamp == prev {
                return Err(BarError::DuplicateTimestamp {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if bar.timestamp < prev {
                return Err(BarError::Unsorted {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}

/// Extract the close column.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Extract the volume column.
pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_bar(day: u32) -> Bar {
        Bar {
            timestamp: ts(day),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn valid_table_passes() {
        let bars = vec![sample_bar(1), sample_bar(2), sample_bar(3)];
        assert!(validate_table(&bars).is_ok());
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let bars = vec![sample_bar(1), sample_bar(1)];
        assert!(matches!(
            validate_table(&bars),
            Err(BarError::DuplicateTimestamp { index: 1, .. })
        ));
    }

    #[test]
    fn unsorted_rejected() {
        let bars = vec![sample_bar(2), sample_bar(1)];
        assert!(matches!(
            validate_table(&bars),
            Err(BarError::Unsorted { index: 1, .. })
        ));
    }

    #[test]
    fn zero_price_rejected() {
        let mut bar = sample_bar(1);
        bar.low = 0.0;
        assert!(matches!(
            validate_table(&[bar]),
            Err(BarError::InvalidPrice { index: 0, .. })
        ));
    }

    #[test]
    fn negative_volume_rejected() {
        let mut bar = sample_bar(1);
        bar.volume = -1.0;
        assert!(matches!(
            validate_table(&[bar]),
            Err(BarError::InvalidVolume { index: 0, .. })
        ));
    }

    #[test]
    fn scaled_leaves_volume() {
        let bar = sample_bar(1).scaled(103.0);
        assert!((bar.close - 1.0).abs() < 1e-12);
        assert!((bar.open - 100.0 / 103.0).abs() < 1e-12);
        assert_eq!(bar.volume, 50_000.0);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar(5);
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
