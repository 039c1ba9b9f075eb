//! Typed errors for the game domain.

use crate::models::GamePhase;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {event} while in {from} phase")]
    IllegalTransition { from: GamePhase, event: &'static str },
    #[error("no tweets available to start a session")]
    EmptyBacklog,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    #[error("unknown upgrade: {0}")]
    UnknownUpgrade(String),
    #[error("upgrade {id} is already at max level {max_level}")]
    MaxLevel { id: String, max_level: u32 },
    #[error("upgrade {id} costs {price}, only {money} available")]
    InsufficientFunds { id: String, price: i64, money: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
