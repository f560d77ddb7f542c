//! Summary statistics and Student-t intervals for multi-run evaluation.
//!
//! Implements from first principles:
//! - Lanczos approximation for ln(Gamma)
//! - Regularized incomplete beta function
//! - Student's t-distribution CDF and quantile
//! - Mean, sample standard deviation, confidence and prediction intervals
//!
//! Intervals assume the per-run changes are roughly normal and independent.
//! Runs share one price table, so treat the bounds as descriptive.

use serde::{Deserialize, Serialize};

// ─── Math primitives ─────────────────────────────────────────────────

/// Lanczos approximation for ln(Gamma(x)), g=7, n=9.
fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection: Gamma(x) * Gamma(1-x) = pi / sin(pi*x)
        let sin_val = (std::f64::consts::PI * x).sin();
        if sin_val.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return std::f64::consts::PI.ln() - sin_val.abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let sum = COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEFFICIENTS[0], |acc, (i, &c)| acc + c / (x + i as f64));
    let t = x + G + 0.5;
    let log_sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt().ln();

    log_sqrt_2pi + t.ln() * (x + 0.5) - t + sum.ln()
}

/// Regularized incomplete beta I_x(a, b), modified Lentz continued fraction.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NAN;
    }
    if x == 0.0 || x == 1.0 {
        return x;
    }
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(b, a, 1.0 - x);
    }

    let ln_prefix =
        a * x.ln() + b * (1.0 - x).ln() - ln_gamma(a) - ln_gamma(b) + ln_gamma(a + b) - a.ln();

    const MAX_ITER: usize = 200;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-30;
    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0_f64;
    let mut d = 1.0 / clamp(1.0 - (a + b) * x / (a + 1.0));
    let mut f = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;

        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        f *= c * d;

        let odd = -((a + m) * (a + b + m) * x) / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = c * d;
        f *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    ln_prefix.exp() * f
}

/// Student's t-distribution CDF: P(T <= t) for `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 || t.is_nan() {
        return f64::NAN;
    }
    if t == 0.0 {
        return 0.5;
    }
    let ib = regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t));
    if t > 0.0 {
        1.0 - 0.5 * ib
    } else {
        0.5 * ib
    }
}

/// Inverse of [`t_cdf`]: the t with P(T <= t) = p. Bisection on the CDF.
pub fn t_quantile(p: f64, df: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) || df <= 0.0 {
        return f64::NAN;
    }
    if p == 0.5 {
        return 0.0;
    }
    if p < 0.5 {
        return -t_quantile(1.0 - p, df);
    }

    let mut hi = 1.0;
    while t_cdf(hi, df) < p && hi < 1e12 {
        hi *= 2.0;
    }
    let mut lo = 0.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 * hi.max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

// ─── Descriptive statistics ──────────────────────────────────────────

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n − 1 denominator). None below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (n as f64 - 1.0)).sqrt())
}

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

fn two_sided_t(level: f64, n: usize) -> f64 {
    t_quantile(0.5 + level / 2.0, n as f64 - 1.0)
}

/// Student-t confidence interval for the mean at `level` (e.g. 0.95).
pub fn confidence_interval(values: &[f64], level: f64) -> Option<Interval> {
    let m = mean(values)?;
    let s = sample_std(values)?;
    let half = two_sided_t(level, values.len()) * s / (values.len() as f64).sqrt();
    Some(Interval {
        lower: m - half,
        upper: m + half,
    })
}

/// Student-t prediction interval for one further observation.
pub fn prediction_interval(values: &[f64], level: f64) -> Option<Interval> {
    let m = mean(values)?;
    let s = sample_std(values)?;
    let n = values.len() as f64;
    let half = two_sided_t(level, values.len()) * s * (1.0 + 1.0 / n).sqrt();
    Some(Interval {
        lower: m - half,
        upper: m + half,
    })
}

/// Aggregate over one metric's per-run values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub confidence: Option<Interval>,
    pub prediction: Option<Interval>,
}

impl Summary {
    /// Summarize `values`, ignoring non-finite entries.
    pub fn from_values(values: &[f64], level: f64) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        Self {
            count: finite.len(),
            mean: mean(&finite),
            std: sample_std(&finite),
            confidence: confidence_interval(&finite, level),
            prediction: prediction_interval(&finite, level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── ln_gamma ────────────────────────────────────────────────

    #[test]
    fn ln_gamma_known_values() {
        assert!(ln_gamma(1.0).abs() < 1e-10);
        assert!(ln_gamma(2.0).abs() < 1e-10);
        assert!((ln_gamma(3.0) - 2.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    // ─── t distribution ──────────────────────────────────────────

    #[test]
    fn t_cdf_symmetry() {
        for &t in &[0.5, 1.0, 2.0, 3.0] {
            let sum = t_cdf(-t, 10.0) + t_cdf(t, 10.0);
            assert!((sum - 1.0).abs() < 1e-10, "t={t}");
        }
    }

    #[test]
    fn t_cdf_cauchy() {
        assert!((t_cdf(1.0, 1.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn t_quantile_table_values() {
        assert!((t_quantile(0.975, 1.0) - 12.706).abs() < 1e-3);
        assert!((t_quantile(0.975, 10.0) - 2.228).abs() < 1e-3);
        assert!((t_quantile(0.95, 5.0) - 2.015).abs() < 1e-3);
        assert!((t_quantile(0.975, 1000.0) - 1.962).abs() < 1e-3);
    }

    #[test]
    fn t_quantile_inverts_cdf() {
        for &df in &[2.0, 7.0, 30.0] {
            for &p in &[0.05, 0.3, 0.5, 0.8, 0.99] {
                let t = t_quantile(p, df);
                assert!((t_cdf(t, df) - p).abs() < 1e-9, "p={p} df={df}");
            }
        }
    }

    #[test]
    fn t_quantile_rejects_bad_input() {
        assert!(t_quantile(0.0, 5.0).is_nan());
        assert!(t_quantile(1.0, 5.0).is_nan());
        assert!(t_quantile(0.5, 0.0).is_nan());
    }

    // ─── descriptive ─────────────────────────────────────────────

    #[test]
    fn mean_and_sample_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        // population std is 2, sample std is sqrt(32/7)
        let s = sample_std(&values).unwrap();
        assert!((s - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn confidence_interval_matches_hand_computation() {
        // n=5, mean 3, s = sqrt(2.5), t(0.975, 4) = 2.7764
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ci = confidence_interval(&values, 0.95).unwrap();
        let half = 2.776_445 * 2.5_f64.sqrt() / 5.0_f64.sqrt();
        assert!((ci.lower - (3.0 - half)).abs() < 1e-4);
        assert!((ci.upper - (3.0 + half)).abs() < 1e-4);
    }

    #[test]
    fn intervals_widen_with_level() {
        let values = [0.1, -0.2, 0.05, 0.3, 0.0, 0.12];
        let narrow = confidence_interval(&values, 0.80).unwrap();
        let wide = confidence_interval(&values, 0.99).unwrap();
        assert!(wide.width() > narrow.width());
    }

    #[test]
    fn prediction_contains_confidence() {
        let values = [10.0, 12.0, 9.5, 11.0, 10.5, 13.0, 8.0];
        let ci = confidence_interval(&values, 0.95).unwrap();
        let pi = prediction_interval(&values, 0.95).unwrap();
        assert!(pi.lower <= ci.lower && ci.upper <= pi.upper);
        assert!(ci.contains(mean(&values).unwrap()));
    }

    #[test]
    fn summary_skips_non_finite() {
        let summary = Summary::from_values(&[1.0, f64::NAN, 3.0, f64::INFINITY], 0.95);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, Some(2.0));
        assert!(summary.confidence.is_some());
    }

    #[test]
    fn summary_of_single_value_has_no_spread() {
        let summary = Summary::from_values(&[4.0], 0.95);
        assert_eq!(summary.mean, Some(4.0));
        assert_eq!(summary.std, None);
        assert_eq!(summary.confidence, None);
        assert_eq!(summary.prediction, None);
    }
}
