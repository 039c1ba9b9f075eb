//! game_session_rust - Runs moderation-simulator sessions against the game backend

pub mod config;
pub mod controller;
pub mod rewards;
pub mod timers;
pub mod types;

pub use config::ServiceConfig;
pub use controller::{Collaborators, SessionController, SessionHandle};
pub use rewards::RewardLedger;
pub use types::{SessionCommand, SessionReport, SessionSnapshot};
