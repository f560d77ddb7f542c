//! Velocity and acceleration of the close price.
//!
//! Velocity(w): rolling mean of first differences. Lookback: w.
//! Acceleration(w): rolling mean of the first difference of Velocity(w).
//! Lookback: 2w.

use super::{first_difference, rolling_mean, Indicator, IndicatorKind};
use crate::domain::{closes, Bar};

#[derive(Debug, Clone)]
pub struct Velocity {
    window: usize,
    name: String,
}

impl Velocity {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "velocity window must be >= 1");
        Self {
            window,
            name: format!("velocity_{window}"),
        }
    }
}

fn velocity_of(values: &[f64], window: usize) -> Vec<f64> {
    rolling_mean(&first_difference(values), window)
}

impl Indicator for Velocity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Velocity
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        velocity_of(&closes(bars), self.window)
    }
}

#[derive(Debug, Clone)]
pub struct Acceleration {
    window: usize,
    name: String,
}

impl Acceleration {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "acceleration window must be >= 1");
        Self {
            window,
            name: format!("acceleration_{window}"),
        }
    }
}

impl Indicator for Acceleration {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Acceleration
    }

    fn lookback(&self) -> usize {
        2 * self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let velocity = velocity_of(&closes(bars), self.window);
        rolling_mean(&first_difference(&velocity), self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn linear_series_has_constant_velocity() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + 2.0 * i as f64).collect();
        let bars = make_bars(&closes);
        let result = Velocity::new(3).compute(&bars);
        for v in &result[..3] {
            assert!(v.is_nan());
        }
        for v in &result[3..] {
            assert_approx(*v, 2.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn linear_series_has_zero_acceleration() {
        let closes: Vec<f64> = (0..12).map(|i| 50.0 + 0.5 * i as f64).collect();
        let bars = make_bars(&closes);
        let acc = Acceleration::new(2);
        let result = acc.compute(&bars);
        assert_eq!(acc.lookback(), 4);
        assert!(result[3].is_nan());
        for v in &result[4..] {
            assert_approx(*v, 0.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn quadratic_series_has_constant_acceleration() {
        // close = i^2 → diffs 2i-1 → second diffs 2
        let closes: Vec<f64> = (1..15).map(|i| (i * i) as f64).collect();
        let bars = make_bars(&closes);
        let result = Acceleration::new(3).compute(&bars);
        for v in &result[6..] {
            assert_approx(*v, 2.0, DEFAULT_EPSILON);
        }
    }
}
