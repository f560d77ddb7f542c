//! Domain types for RegimeLab

pub mod account;
pub mod action;
pub mod bar;
pub mod order;
pub mod phase;
pub mod position;

pub use account::Account;
pub use action::{Action, ActionKind, Fill, Side};
pub use bar::{closes, validate_table, volumes, Bar, BarError};
pub use order::Order;
pub use phase::{Regime, TradingPhase};
pub use position::{Position, PositionDirection, POSITION_EPSILON};
