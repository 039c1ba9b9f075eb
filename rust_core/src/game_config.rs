//! Game tuning constants and environment overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Length of a session in milliseconds
pub const GAME_DURATION_MS: u64 = 60_000;
/// Period of the passive time-score timer
pub const TIME_SCORE_INTERVAL_MS: u64 = 2_000;
/// Points granted per time-score tick before upgrades
pub const TIME_SCORE_AMOUNT: i64 = 5;
/// Half of the visible feed capacity
pub const INITIAL_TWEETS_COUNT: usize = 5;
/// Feed refresh period at speed 1.0
pub const REFRESH_INTERVAL_MS: u64 = 8_000;
/// No tweet is injected once less than this much time remains
pub const INSERT_CUTOFF_MS: u64 = 5_000;
/// Delay before a new feed entry loses its `is_new` flag
pub const NEW_FLAG_DELAY_MS: u64 = 600;
/// Fact checks available before upgrades
pub const BASE_FACT_CHECKS: u32 = 5;
/// Session clock decrement
pub const CLOCK_STEP_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub game_duration_ms: u64,
    pub time_score_interval_ms: u64,
    pub time_score_amount: i64,
    pub initial_tweets_count: usize,
    pub refresh_interval_ms: u64,
    pub insert_cutoff_ms: u64,
    pub new_flag_delay_ms: u64,
    pub base_fact_checks: u32,
    pub clock_step_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_duration_ms: GAME_DURATION_MS,
            time_score_interval_ms: TIME_SCORE_INTERVAL_MS,
            time_score_amount: TIME_SCORE_AMOUNT,
            initial_tweets_count: INITIAL_TWEETS_COUNT,
            refresh_interval_ms: REFRESH_INTERVAL_MS,
            insert_cutoff_ms: INSERT_CUTOFF_MS,
            new_flag_delay_ms: NEW_FLAG_DELAY_MS,
            base_fact_checks: BASE_FACT_CHECKS,
            clock_step_ms: CLOCK_STEP_MS,
        }
    }
}

impl GameConfig {
    /// Load overrides from environment variables, keeping defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            game_duration_ms: env_or("GAME_DURATION_MS", defaults.game_duration_ms),
            time_score_interval_ms: env_or("TIME_SCORE_INTERVAL_MS", defaults.time_score_interval_ms),
            time_score_amount: env_or("TIME_SCORE_AMOUNT", defaults.time_score_amount),
            initial_tweets_count: env_or("INITIAL_TWEETS_COUNT", defaults.initial_tweets_count),
            refresh_interval_ms: env_or("REFRESH_INTERVAL_MS", defaults.refresh_interval_ms),
            insert_cutoff_ms: env_or("INSERT_CUTOFF_MS", defaults.insert_cutoff_ms),
            new_flag_delay_ms: defaults.new_flag_delay_ms,
            base_fact_checks: env_or("BASE_FACT_CHECKS", defaults.base_fact_checks),
            clock_step_ms: defaults.clock_step_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("game_duration_ms", self.game_duration_ms),
            ("time_score_interval_ms", self.time_score_interval_ms),
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("clock_step_ms", self.clock_step_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::ZeroPeriod(name));
            }
        }
        if self.initial_tweets_count == 0 {
            return Err(ConfigError::ZeroPeriod("initial_tweets_count"));
        }
        Ok(())
    }

    /// Maximum number of entries kept in the visible feed
    pub fn feed_capacity(&self) -> usize {
        self.initial_tweets_count * 2
    }

    pub fn clock_step(&self) -> Duration {
        Duration::from_millis(self.clock_step_ms)
    }

    pub fn time_score_interval(&self) -> Duration {
        Duration::from_millis(self.time_score_interval_ms)
    }

    pub fn new_flag_delay(&self) -> Duration {
        Duration::from_millis(self.new_flag_delay_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
