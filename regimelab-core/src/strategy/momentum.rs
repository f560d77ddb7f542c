//! Momentum strategy: velocity and acceleration confirmed by MACD, gated by RSI.
//!
//! BUY when velocity > 0, acceleration > 0, MACD line > signal and
//! RSI < overbought. SELL on the full mirror with RSI > oversold.
//! Orders are edge-triggered: a signal only trades on the step it appears.

use serde::{Deserialize, Serialize};

use super::{require_window, SizingParams, Strategy, StrategyError};
use crate::domain::{Account, Action, Bar};
use crate::indicators::{
    compute_series, Acceleration, Bollinger, Indicator, IndicatorSeries, Macd, Rsi, Velocity,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub velocity_window: usize,
    pub acceleration_window: usize,
    pub rsi_window: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub sizing: SizingParams,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            velocity_window: 5,
            acceleration_window: 5,
            rsi_window: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
            sizing: SizingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumSignal {
    Buy,
    Sell,
    #[default]
    Hold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumState {
    pub last_signal: MomentumSignal,
    pub buys: u32,
    pub sells: u32,
}

pub struct MomentumStrategy {
    params: MomentumParams,
    velocity: Velocity,
    acceleration: Acceleration,
    rsi: Rsi,
    macd_line: Macd,
    macd_signal: Macd,
    state: MomentumState,
}

impl MomentumStrategy {
    pub fn new(params: MomentumParams) -> Result<Self, StrategyError> {
        params.sizing.validate()?;
        let windows = [
            params.velocity_window,
            params.acceleration_window,
            params.rsi_window,
            params.macd_fast,
            params.macd_slow,
            params.macd_signal,
            params.bollinger_period,
        ];
        if windows.contains(&0) {
            return Err(StrategyError::InvalidParams(
                "indicator windows must be >= 1".into(),
            ));
        }
        if params.macd_fast >= params.macd_slow {
            return Err(StrategyError::InvalidParams(
                "macd_fast must be shorter than macd_slow".into(),
            ));
        }
        if !(params.bollinger_k.is_finite() && params.bollinger_k >= 0.0) {
            return Err(StrategyError::InvalidParams(format!(
                "bollinger_k must be finite and non-negative, got {}",
                params.bollinger_k
            )));
        }
        // Bounds outside [0, 100] are allowed and disable the gate.
        if !(params.rsi_oversold.is_finite()
            && params.rsi_overbought.is_finite()
            && params.rsi_oversold < params.rsi_overbought)
        {
            return Err(StrategyError::InvalidParams(
                "RSI bounds must be finite with oversold < overbought".into(),
            ));
        }
        Ok(Self {
            velocity: Velocity::new(params.velocity_window),
            acceleration: Acceleration::new(params.acceleration_window),
            rsi: Rsi::new(params.rsi_window),
            macd_line: Macd::line(params.macd_fast, params.macd_slow, params.macd_signal),
            macd_signal: Macd::signal(params.macd_fast, params.macd_slow, params.macd_signal),
            params,
            state: MomentumState::default(),
        })
    }

    pub fn state(&self) -> &MomentumState {
        &self.state
    }

    /// Classify the last bar of `window`.
    pub fn signal(&self, window: &[Bar]) -> MomentumSignal {
        let last = |ind: &dyn Indicator| compute_series(ind, window).last().unwrap_or(f64::NAN);
        let v = last(&self.velocity);
        let a = last(&self.acceleration);
        let rsi = last(&self.rsi);
        let line = last(&self.macd_line);
        let signal = last(&self.macd_signal);
        if [v, a, rsi, line, signal].iter().any(|x| x.is_nan()) {
            return MomentumSignal::Hold;
        }

        if v > 0.0 && a > 0.0 && line > signal && rsi < self.params.rsi_overbought {
            MomentumSignal::Buy
        } else if v < 0.0 && a < 0.0 && line < signal && rsi > self.params.rsi_oversold {
            MomentumSignal::Sell
        } else {
            MomentumSignal::Hold
        }
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn warmup_bars(&self) -> usize {
        [
            self.velocity.lookback(),
            self.acceleration.lookback(),
            self.rsi.lookback(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    fn run(&mut self, window: &[Bar], account: &Account) -> Result<Vec<Action>, StrategyError> {
        let bar = require_window(window)?;
        let price = bar.close;
        let signal = self.signal(window);
        let edge = signal != self.state.last_signal;
        self.state.last_signal = signal;

        let action = match signal {
            MomentumSignal::Buy if edge => {
                let amount = self.params.sizing.quote_amount(account.balance_b(), price);
                (amount > 0.0 && amount * price <= account.balance_b()).then(|| {
                    self.state.buys += 1;
                    Action::buy(price, amount)
                })
            }
            MomentumSignal::Sell if edge => {
                let amount = self.params.sizing.base_amount(account.balance_a(), price);
                (amount > 0.0 && amount <= account.balance_a()).then(|| {
                    self.state.sells += 1;
                    Action::sell(price, amount)
                })
            }
            _ => None,
        };
        Ok(vec![action.unwrap_or(Action::Wait)])
    }

    fn calculate_indicators(&self, window: &[Bar]) -> Vec<IndicatorSeries> {
        let p = &self.params;
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(self.velocity.clone()),
            Box::new(self.acceleration.clone()),
            Box::new(self.rsi.clone()),
            Box::new(self.macd_line.clone()),
            Box::new(self.macd_signal.clone()),
            Box::new(Macd::histogram(p.macd_fast, p.macd_slow, p.macd_signal)),
            Box::new(Bollinger::upper(p.bollinger_period, p.bollinger_k)),
            Box::new(Bollinger::middle(p.bollinger_period, p.bollinger_k)),
            Box::new(Bollinger::lower(p.bollinger_period, p.bollinger_k)),
        ];
        indicators
            .iter()
            .map(|ind| compute_series(ind.as_ref(), window))
            .collect()
    }
}
