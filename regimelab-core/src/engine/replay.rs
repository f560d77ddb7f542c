//! Sequential replay harness.
//!
//! A window of `window_size` bars slides forward one bar at a time. At each
//! position the strategy sees the window and the live account; every action it
//! returns is settled immediately, stamped with the window's last timestamp.
//! A single replay is never parallelized.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::cancel::CancelToken;
use super::execution::{execute_action, BalancePolicy, ExecutionOutcome};
use super::metrics_table::{build_metrics_table, MetricsRow};
use super::EngineError;
use crate::domain::{validate_table, Account, Bar, Order, TradingPhase};
use crate::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub window_size: usize,
    /// Proportional fee, charged in the asset received.
    pub fee: f64,
    pub policy: BalancePolicy,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            fee: 0.001,
            policy: BalancePolicy::default(),
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window_size == 0 {
            return Err(EngineError::InvalidConfig(
                "window_size must be >= 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.fee) {
            return Err(EngineError::InvalidConfig(format!(
                "fee must be within [0, 1), got {}",
                self.fee
            )));
        }
        Ok(())
    }
}

/// Phase reported by the strategy at one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    pub timestamp: NaiveDateTime,
    pub phase: TradingPhase,
}

/// Everything a replay produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub ledger: Vec<Order>,
    pub metrics_table: Vec<MetricsRow>,
    /// Number of windows fed to the strategy.
    pub steps: usize,
    pub rejected_actions: usize,
    pub final_account: Account,
    /// Empty for strategies that do not track a phase.
    pub phase_trace: Vec<PhasePoint>,
}

impl ReplayResult {
    pub fn first_row(&self) -> Option<&MetricsRow> {
        self.metrics_table.first()
    }

    pub fn last_row(&self) -> Option<&MetricsRow> {
        self.metrics_table.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: ReplayConfig,
    cancel: Option<CancelToken>,
}

impl Backtester {
    pub fn new(config: ReplayConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay `bars` through `strategy`, starting from `account`.
    pub fn run(
        &self,
        bars: &[Bar],
        strategy: &mut dyn Strategy,
        mut account: Account,
    ) -> Result<ReplayResult, EngineError> {
        validate_table(bars)?;
        let window_size = self.config.window_size;
        if bars.len() < window_size {
            return Err(EngineError::InsufficientData {
                bars: bars.len(),
                window_size,
            });
        }
        if strategy.warmup_bars() > window_size {
            tracing::warn!(
                strategy = strategy.name(),
                warmup = strategy.warmup_bars(),
                window_size,
                "window shorter than strategy warm-up; indicators will stay undefined"
            );
        }

        let initial_a = account.balance_a();
        let initial_b = account.balance_b();
        let mut rejected_actions = 0;
        let mut phase_trace = Vec::new();
        let mut steps = 0;

        for end in window_size..=bars.len() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(EngineError::Cancelled);
            }
            let window = &bars[end - window_size..end];
            let timestamp = window[window_size - 1].timestamp;

            let actions = strategy.run(window, &account)?;
            for action in &actions {
                let outcome = execute_action(
                    &mut account,
                    action,
                    timestamp,
                    self.config.fee,
                    self.config.policy,
                );
                if matches!(outcome, ExecutionOutcome::Rejected { .. }) {
                    rejected_actions += 1;
                }
            }
            if let Some(phase) = strategy.phase() {
                phase_trace.push(PhasePoint { timestamp, phase });
            }
            steps += 1;
        }

        let ledger = account.orders().to_vec();
        let metrics_table = build_metrics_table(bars, &ledger, initial_a, initial_b);
        tracing::debug!(
            strategy = strategy.name(),
            steps,
            orders = ledger.len(),
            rejected_actions,
            "replay finished"
        );
        Ok(ReplayResult {
            ledger,
            metrics_table,
            steps,
            rejected_actions,
            final_account: account,
            phase_trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use crate::indicators::{make_bars, IndicatorSeries};
    use crate::strategy::StrategyError;

    /// Buys a fixed amount on every step.
    struct AlwaysBuy(f64);

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &str {
            "always_buy"
        }
        fn warmup_bars(&self) -> usize {
            1
        }
        fn run(&mut self, window: &[Bar], _: &Account) -> Result<Vec<Action>, StrategyError> {
            let close = window[window.len() - 1].close;
            Ok(vec![Action::buy(close, self.0)])
        }
        fn calculate_indicators(&self, _: &[Bar]) -> Vec<IndicatorSeries> {
            Vec::new()
        }
    }

    /// Fails on the n-th call.
    struct FailsAt(usize);

    impl Strategy for FailsAt {
        fn name(&self) -> &str {
            "fails_at"
        }
        fn warmup_bars(&self) -> usize {
            1
        }
        fn run(&mut self, _: &[Bar], _: &Account) -> Result<Vec<Action>, StrategyError> {
            if self.0 == 0 {
                return Err(StrategyError::Execution("boom".into()));
            }
            self.0 -= 1;
            Ok(vec![Action::Wait])
        }
        fn calculate_indicators(&self, _: &[Bar]) -> Vec<IndicatorSeries> {
            Vec::new()
        }
    }

    fn backtester(window_size: usize, fee: f64) -> Backtester {
        Backtester::new(ReplayConfig {
            window_size,
            fee,
            policy: BalancePolicy::Reject,
        })
        .unwrap()
    }

    #[test]
    fn steps_cover_every_window() {
        let bars = make_bars(&[10.0; 10]);
        let result = backtester(4, 0.0)
            .run(&bars, &mut AlwaysBuy(0.0), Account::new("X/Y", 0.0, 0.0))
            .unwrap();
        assert_eq!(result.steps, 7);
        assert!(result.ledger.is_empty());
        assert_eq!(result.metrics_table.len(), 10);
    }

    #[test]
    fn orders_stamped_with_window_end() {
        let bars = make_bars(&[10.0, 10.0, 10.0]);
        let result = backtester(2, 0.0)
            .run(&bars, &mut AlwaysBuy(1.0), Account::new("X/Y", 0.0, 100.0))
            .unwrap();
        assert_eq!(result.ledger.len(), 2);
        assert_eq!(result.ledger[0].timestamp, bars[1].timestamp);
        assert_eq!(result.ledger[1].timestamp, bars[2].timestamp);
        assert!((result.final_account.balance_b() - 80.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_actions_counted() {
        let bars = make_bars(&[10.0; 5]);
        let result = backtester(1, 0.0)
            .run(&bars, &mut AlwaysBuy(4.0), Account::new("X/Y", 0.0, 100.0))
            .unwrap();
        // 100 covers two buys of 40
        assert_eq!(result.ledger.len(), 2);
        assert_eq!(result.rejected_actions, 3);
    }

    #[test]
    fn strategy_error_aborts() {
        let bars = make_bars(&[10.0; 5]);
        let err = backtester(1, 0.0)
            .run(&bars, &mut FailsAt(2), Account::new("X/Y", 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Strategy(_)));
    }

    #[test]
    fn short_table_is_an_error() {
        let bars = make_bars(&[10.0; 3]);
        let err = backtester(5, 0.0)
            .run(&bars, &mut AlwaysBuy(1.0), Account::new("X/Y", 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                bars: 3,
                window_size: 5
            }
        ));
    }

    #[test]
    fn cancelled_token_stops_replay() {
        let token = CancelToken::new();
        token.cancel();
        let bars = make_bars(&[10.0; 5]);
        let err = backtester(2, 0.0)
            .with_cancel(token)
            .run(&bars, &mut AlwaysBuy(1.0), Account::new("X/Y", 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(Backtester::new(ReplayConfig {
            window_size: 0,
            ..Default::default()
        })
        .is_err());
        assert!(Backtester::new(ReplayConfig {
            fee: 1.5,
            ..Default::default()
        })
        .is_err());
    }
}
