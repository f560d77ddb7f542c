//! Rolling population standard deviation of close prices.
//! Lookback: period - 1.

use super::{rolling_std, Indicator, IndicatorKind};
use crate::domain::{closes, Bar};

#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
    name: String,
}

impl RollingStd {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "stddev period must be >= 1");
        Self {
            period,
            name: format!("std_{period}"),
        }
    }
}

impl Indicator for RollingStd {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::StandardDeviation
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_std(&closes(bars), self.period)
    }
}
