use super::{http_client, send_guarded, AuthTokenProvider, TweetSource};
use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig};
use crate::models::{RawTweetRecord, Tweet};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tweet backlog served by the game backend
#[derive(Clone)]
pub struct HttpTweetSource {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthTokenProvider>,
    circuit_breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for HttpTweetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTweetSource")
            .field("base_url", &self.base_url)
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl HttpTweetSource {
    pub fn new(
        base_url: &str,
        auth: Arc<dyn AuthTokenProvider>,
        config: ApiCircuitBreakerConfig,
    ) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            circuit_breaker: Arc::new(ApiCircuitBreaker::new("tweets", config)),
        }
    }

    async fn token(&self) -> Result<String> {
        self.auth
            .auth_token()
            .await?
            .ok_or_else(|| anyhow!("You must be logged in to access the moderation panel"))
    }
}

#[async_trait]
impl TweetSource for HttpTweetSource {
    async fn fetch_tweets(&self, hashtag: Option<&str>) -> Result<Vec<Tweet>> {
        let token = self.token().await?;

        let mut request = self
            .client
            .get(format!("{}/api/protected/tweets", self.base_url))
            .bearer_auth(token);
        if let Some(tag) = hashtag {
            request = request.query(&[("hashtag", tag)]);
        }

        let resp = send_guarded(&self.circuit_breaker, request, "tweet API").await?;
        if !resp.status().is_success() {
            return Err(anyhow!("tweet API returned status: {}", resp.status()));
        }
        let body: Value = resp.json().await.context("invalid tweet payload")?;
        let tweets = parse_tweet_payload(body, Utc::now())?;
        debug!("Fetched {} tweets (hashtag={:?})", tweets.len(), hashtag);
        Ok(tweets)
    }
}

/// Normalise the backend body: a bare array of records or `{ "tweets": [...] }`
pub fn parse_tweet_payload(body: Value, now: DateTime<Utc>) -> Result<Vec<Tweet>> {
    let records = match body {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("tweets") {
            Some(Value::Array(records)) => records,
            _ => return Err(anyhow!("tweet payload has no tweets array")),
        },
        other => return Err(anyhow!("unexpected tweet payload: {}", other)),
    };

    let tweets = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<RawTweetRecord>(record) {
            Ok(raw) => Some(raw.into_tweet(index, now)),
            Err(e) => {
                warn!("Skipping malformed tweet record {}: {}", index, e);
                None
            }
        })
        .collect();
    Ok(tweets)
}
