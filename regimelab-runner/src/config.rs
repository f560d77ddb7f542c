//! TOML run configuration.
//!
//! One file describes a complete experiment:
//!
//! ```toml
//! [backtest]
//! pair = "BTC/USDT"
//! data_path = "data/btc_usdt_1h.csv"
//! initial_balance_a = 1.0
//! initial_balance_b = 1000.0
//! window_size = 50
//! fee = 0.001
//! policy = "reject"
//!
//! [strategy]
//! type = "multi_moving_average"
//! ma_windows = [5, 10, 20]
//! phase = "ACCUMULATION"
//!
//! [sampling]
//! duration = 500
//! target_variation = 0.0
//! tolerance = 0.05
//!
//! [evaluation]
//! runs = 100
//! seed = 42
//! metrics = ["adjusted_balance_b", "total_value_b"]
//! ```
//!
//! Every section and field has a default.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::engine::{
    BalancePolicy, EngineError, Metric, ReplayConfig, SamplingConfig, SamplingError,
};
use regimelab_core::strategy::{StrategyConfig, StrategyError};

use crate::data_loader::parse_timestamp;

/// Content hash identifying a configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid [backtest] section: {0}")]
    Backtest(String),
    #[error("invalid [evaluation] section: {0}")]
    Evaluation(String),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Replay(#[from] EngineError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

// ─── Sections ────────────────────────────────────────────────────────

/// Pair, price data, starting balances and replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub pair: String,
    /// CSV price table. May also be given on the command line.
    pub data_path: Option<PathBuf>,
    /// Inclusive trim bounds, any timestamp format the loader accepts.
    pub start: Option<String>,
    pub end: Option<String>,
    pub initial_balance_a: f64,
    pub initial_balance_b: f64,
    pub window_size: usize,
    pub fee: f64,
    pub policy: BalancePolicy,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let replay = ReplayConfig::default();
        Self {
            pair: "BTC/USDT".into(),
            data_path: None,
            start: None,
            end: None,
            initial_balance_a: 1.0,
            initial_balance_b: 1000.0,
            window_size: replay.window_size,
            fee: replay.fee,
            policy: replay.policy,
        }
    }
}

impl BacktestSection {
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            window_size: self.window_size,
            fee: self.fee,
            policy: self.policy,
        }
    }

    /// Parsed trim bounds.
    pub fn range(&self) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>), ConfigError> {
        let parse = |raw: &Option<String>| {
            raw.as_deref()
                .map(|s| {
                    parse_timestamp(s)
                        .ok_or_else(|| ConfigError::Backtest(format!("unrecognized timestamp '{s}'")))
                })
                .transpose()
        };
        let (start, end) = (parse(&self.start)?, parse(&self.end)?);
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ConfigError::Backtest(format!("start {s} is after end {e}")));
            }
        }
        Ok((start, end))
    }
}

/// Multi-run evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub runs: usize,
    pub seed: u64,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    /// Metrics-table columns whose first→last change is aggregated.
    pub metrics: Vec<Metric>,
    /// Two-sided level of the confidence and prediction intervals.
    pub confidence: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            runs: 100,
            seed: 42,
            threads: 0,
            metrics: vec![Metric::AdjustedBalanceB, Metric::TotalValueB],
            confidence: 0.95,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::Evaluation("runs must be >= 1".into()));
        }
        if self.metrics.is_empty() {
            return Err(ConfigError::Evaluation(
                "at least one metric is required".into(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ConfigError::Evaluation(format!(
                "confidence must be within (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategyConfig,
    pub sampling: SamplingConfig,
    pub evaluation: EvaluationConfig,
}

impl RegimeConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: RegimeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Check every section. Does not touch the data file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        if b.pair.trim().is_empty() {
            return Err(ConfigError::Backtest("pair must not be empty".into()));
        }
        for (name, value) in [
            ("initial_balance_a", b.initial_balance_a),
            ("initial_balance_b", b.initial_balance_b),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Backtest(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        b.range()?;
        b.replay_config().validate()?;
        self.strategy.validate()?;
        self.sampling.validate()?;
        if self.sampling.duration < b.window_size {
            return Err(SamplingError::InvalidConfig(format!(
                "duration {} is shorter than backtest.window_size {}",
                self.sampling.duration, b.window_size
            ))
            .into());
        }
        self.evaluation.validate()?;
        Ok(())
    }

    /// Deterministic hash of the whole configuration.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
