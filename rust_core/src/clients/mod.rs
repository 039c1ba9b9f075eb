//! Collaborator contracts and their HTTP implementations.
//!
//! The session only talks to the outside world through the traits below.
//! Each reqwest-backed implementation sits behind an [`ApiCircuitBreaker`]
//! so a dead backend is not hammered.
//!
//! [`ApiCircuitBreaker`]: crate::circuit_breaker::ApiCircuitBreaker

use crate::models::{FactCheckOutcome, GameStatsUpdate, Tweet, UpgradeState, UserProfile, Wallet};
use crate::circuit_breaker::ApiCircuitBreaker;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

pub mod auth;
pub mod fact_check;
pub mod news;
pub mod profile;
pub mod tweets;

pub use auth::{EnvTokenProvider, StaticTokenProvider};
pub use fact_check::{FactChecker, GoogleFactCheckClient};
pub use news::NewsApiClient;
pub use profile::HttpProfileStore;
pub use tweets::HttpTweetSource;

/// Default timeout for collaborator requests
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies the bearer token of the current player
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    /// `Ok(None)` when nobody is signed in
    async fn auth_token(&self) -> Result<Option<String>>;
}

/// Backlog of tweets for a session
#[async_trait]
pub trait TweetSource: Send + Sync {
    async fn fetch_tweets(&self, hashtag: Option<&str>) -> Result<Vec<Tweet>>;
}

/// Evidence lookup for a claim
#[async_trait]
pub trait FactCheckService: Send + Sync {
    async fn check_fact(&self, claim: &str) -> Result<FactCheckOutcome>;
}

/// Persistent player profile
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_wallet(&self) -> Result<Wallet>;

    async fn update_user_upgrades(&self, money: i64, upgrades: &UpgradeState) -> Result<UserProfile>;

    async fn update_user_stats(&self, stats: &GameStatsUpdate) -> Result<()>;
}

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send `request` through `breaker`.
///
/// Only transport errors and 5xx responses count against the breaker; any
/// other status is handed back for the caller to judge.
pub(crate) async fn send_guarded(
    breaker: &ApiCircuitBreaker,
    request: RequestBuilder,
    what: &str,
) -> Result<Response> {
    breaker
        .call(async {
            let resp = request
                .send()
                .await
                .with_context(|| format!("{} request failed", what))?;
            if resp.status().is_server_error() {
                return Err(anyhow!("{} returned status: {}", what, resp.status()));
            }
            Ok(resp)
        })
        .await
}
