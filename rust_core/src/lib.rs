//! Modsim Core - game session engine for the moderation simulator.
//!
//! This crate provides:
//! - Session clock, tweet feed scheduler and scoring engine
//! - The welcome/loading/playing/gameover session state machine
//! - Upgrade catalog, effect resolution and the upgrade shop
//! - Keyword extraction for fact-check queries
//! - Collaborator traits (tweets, fact checks, profile, auth) with HTTP clients
//! - Circuit breaker for collaborator calls

pub mod circuit_breaker;
pub mod classifier;
pub mod clients;
pub mod clock;
pub mod error;
pub mod feed;
pub mod game_config;
pub mod keywords;
pub mod models;
pub mod scoring;
pub mod session;
pub mod upgrades;

pub use clock::{ClockTick, SessionClock};
pub use error::{ConfigError, PurchaseError, SessionError};
pub use feed::FeedScheduler;
pub use game_config::GameConfig;
pub use models::*;
pub use scoring::{ScoredAction, ScoringEngine};
pub use session::{GameSession, ModerationOutcome, SessionStart};
pub use upgrades::{resolve_effects, UpgradeEffectResolver, UpgradeEffects, UPGRADE_CATALOG};
