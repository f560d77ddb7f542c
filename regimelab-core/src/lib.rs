//! RegimeLab Core — domain types, indicators, strategies, replay engine.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, actions, orders, accounts, phases, positions)
//! - Causal indicator library over bar windows
//! - Stateful strategies behind the `Strategy` trait, built from `StrategyConfig`
//! - Sliding-window replay with fee-aware execution and a derived metrics table
//! - Randomized segment sampling and a deterministic RNG hierarchy
//! - Account persistence port

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod rng;
pub mod store;
pub mod strategy;
