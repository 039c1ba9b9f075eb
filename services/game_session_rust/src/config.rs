//! Configuration for game_session_rust

use anyhow::Result;
use modsim_rust_core::circuit_breaker::ApiCircuitBreakerConfig;
use modsim_rust_core::{ConfigError, FeedSpeed, GameConfig};
use std::env;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Game backend serving tweets and profiles
    pub api_base_url: String,
    pub auth_token: Option<String>,

    // Fact checking
    pub fact_check_api_key: Option<String>,
    pub news_api_key: Option<String>,

    // Session defaults
    pub feed_speed: FeedSpeed,
    pub hashtag: Option<String>,
    pub game: GameConfig,

    pub circuit_breaker: ApiCircuitBreakerConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let game = GameConfig::from_env();
        game.validate()?;

        let feed_speed = parse_feed_speed(optional("FEED_SPEED"))?;
        let api_base_url = parse_base_url(
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string()),
        )?;

        Ok(Self {
            api_base_url,
            auth_token: optional("AUTH_TOKEN"),
            fact_check_api_key: optional("FACT_CHECK_API_KEY"),
            news_api_key: optional("NEWS_API_KEY"),
            feed_speed,
            hashtag: optional("HASHTAG"),
            game,
            circuit_breaker: ApiCircuitBreakerConfig::from_env(),
        })
    }
}

fn parse_feed_speed(raw: Option<String>) -> Result<FeedSpeed, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<FeedSpeed>()
            .map_err(|_| ConfigError::InvalidValue { key: "FEED_SPEED", value }),
        None => Ok(FeedSpeed::default()),
    }
}

fn parse_base_url(raw: String) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue {
            key: "API_BASE_URL",
            value: raw,
        });
    }
    Ok(url)
}

/// Non-empty value of an environment variable
fn optional(var_name: &str) -> Option<String> {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
