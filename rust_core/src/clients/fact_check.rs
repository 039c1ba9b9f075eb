//! Fact checking against Google Fact Check Tools with a news fallback.

use super::news::{NewsApiClient, DEFAULT_PAGE_SIZE};
use super::{http_client, FactCheckService};
use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig};
use crate::classifier::rating_indicates_misinformation;
use crate::keywords::{extract_key_terms, DEFAULT_MAX_KEYWORDS};
use crate::models::{ClaimReview, FactCheckKind, FactCheckOutcome};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FACT_CHECK_API_URL: &str = "https://factchecktools.googleapis.com/v1alpha1/claims:search";

#[derive(Debug, Default, Deserialize)]
struct ClaimSearchResponse {
    #[serde(default)]
    claims: Vec<ApiClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiClaim {
    #[serde(default)]
    text: String,
    claimant: Option<String>,
    #[serde(default)]
    claim_review: Vec<ApiReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    publisher: Option<ApiPublisher>,
    url: Option<String>,
    textual_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPublisher {
    name: Option<String>,
    site: Option<String>,
}

fn parse_claims(body: ClaimSearchResponse) -> Vec<ClaimReview> {
    body.claims
        .into_iter()
        .map(|claim| {
            let review = claim.claim_review.into_iter().next();
            let (publisher, url, textual_rating) = match review {
                Some(r) => (
                    r.publisher.and_then(|p| p.name.or(p.site)),
                    r.url,
                    r.textual_rating,
                ),
                None => (None, None, None),
            };
            ClaimReview {
                claim_text: claim.text,
                claimant: claim.claimant,
                publisher,
                url,
                textual_rating,
            }
        })
        .collect()
}

/// Whether the evidence says the claim is misinformation. `None` without rated claims.
pub fn verdict(outcome: &FactCheckOutcome) -> Option<bool> {
    if outcome.kind != FactCheckKind::FactCheck {
        return None;
    }
    let ratings: Vec<&str> = outcome
        .claims
        .iter()
        .filter_map(|c| c.textual_rating.as_deref())
        .collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.into_iter().any(rating_indicates_misinformation))
}

#[derive(Clone)]
pub struct GoogleFactCheckClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    circuit_breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for GoogleFactCheckClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleFactCheckClient")
            .field("configured", &self.api_key.is_some())
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl GoogleFactCheckClient {
    pub fn new(api_key: Option<String>, config: ApiCircuitBreakerConfig) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: FACT_CHECK_API_URL.to_string(),
            circuit_breaker: Arc::new(ApiCircuitBreaker::new("fact_check", config)),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<ClaimReview>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FACT_CHECK_API_KEY is not set"))?;
        self.circuit_breaker
            .call(self.search_internal(query, api_key))
            .await
    }

    async fn search_internal(&self, query: &str, api_key: &str) -> Result<Vec<ClaimReview>> {
        let resp = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .query(&[("query", query), ("key", api_key), ("languageCode", "en")])
            .send()
            .await
            .context("fact check request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("fact check API returned status: {}", resp.status()));
        }
        let body: ClaimSearchResponse = resp.json().await.context("invalid fact check payload")?;
        Ok(parse_claims(body))
    }
}

/// Fact checks first by key terms, then by the full claim, then falls back to news
#[derive(Debug, Clone)]
pub struct FactChecker {
    google: GoogleFactCheckClient,
    news: NewsApiClient,
    max_keywords: usize,
}

impl FactChecker {
    pub fn new(google: GoogleFactCheckClient, news: NewsApiClient) -> Self {
        Self {
            google,
            news,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }

    pub fn from_keys(
        fact_check_api_key: Option<String>,
        news_api_key: Option<String>,
        config: ApiCircuitBreakerConfig,
    ) -> Self {
        Self::new(
            GoogleFactCheckClient::new(fact_check_api_key, config.clone()),
            NewsApiClient::new(news_api_key, config),
        )
    }

    /// Claims for the key-term query, or the full claim when that finds nothing
    async fn search_claims(&self, claim: &str, key_terms: &[String]) -> Result<Vec<ClaimReview>> {
        if !key_terms.is_empty() {
            let query = key_terms.join(" ");
            let claims = self.google.search(&query).await?;
            if !claims.is_empty() {
                return Ok(claims);
            }
            debug!("No fact checks for \"{}\", trying the full claim", query);
        }
        self.google.search(claim).await
    }
}

#[async_trait]
impl FactCheckService for FactChecker {
    async fn check_fact(&self, claim: &str) -> Result<FactCheckOutcome> {
        let claim = claim.trim();
        if claim.is_empty() {
            return Ok(FactCheckOutcome::not_found("Claim is required."));
        }
        let key_terms = extract_key_terms(claim, self.max_keywords);
        info!("Fact checking with terms {:?}", key_terms);

        let mut failed = false;
        if self.google.is_configured() {
            match self.search_claims(claim, &key_terms).await {
                Ok(claims) if !claims.is_empty() => return Ok(FactCheckOutcome::claims(claims)),
                Ok(_) => {}
                Err(e) => {
                    warn!("Fact check lookup failed: {:#}", e);
                    failed = true;
                }
            }
        }

        if self.news.is_configured() {
            match self.news.search(&key_terms, DEFAULT_PAGE_SIZE).await {
                Ok(outcome) if outcome.found => return Ok(outcome),
                Ok(_) => {}
                Err(e) => {
                    warn!("News lookup failed: {:#}", e);
                    failed = true;
                }
            }
        }

        if failed {
            return Ok(FactCheckOutcome::unavailable());
        }
        if !self.google.is_configured() && !self.news.is_configured() {
            return Ok(FactCheckOutcome::not_found("Fact checking is not configured."));
        }
        Ok(FactCheckOutcome::not_found("No fact checks found for this claim."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "claims": [
            {
                "text": "Masks cause oxygen deficiency",
                "claimant": "Social media users",
                "claimDate": "2020-06-01T00:00:00Z",
                "claimReview": [
                    {
                        "publisher": { "name": "PolitiFact", "site": "politifact.com" },
                        "url": "https://www.politifact.com/x",
                        "title": "No, masks do not",
                        "textualRating": "Pants on Fire",
                        "languageCode": "en"
                    }
                ]
            },
            { "text": "Unreviewed claim" }
        ]
    }"#;

    #[test]
    fn test_parse_claims() {
        let body: ClaimSearchResponse = serde_json::from_str(SAMPLE).unwrap();
        let claims = parse_claims(body);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].publisher.as_deref(), Some("PolitiFact"));
        assert_eq!(claims[0].textual_rating.as_deref(), Some("Pants on Fire"));
        assert_eq!(claims[1].url, None);
    }

    #[test]
    fn test_empty_response() {
        let body: ClaimSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_claims(body).is_empty());
    }

    #[test]
    fn test_verdict() {
        let body: ClaimSearchResponse = serde_json::from_str(SAMPLE).unwrap();
        let outcome = FactCheckOutcome::claims(parse_claims(body));
        assert_eq!(verdict(&outcome), Some(true));
        assert_eq!(verdict(&FactCheckOutcome::unavailable()), None);
    }

    #[tokio::test]
    async fn test_unconfigured_checker() {
        let checker = FactChecker::from_keys(None, None, ApiCircuitBreakerConfig::default());
        let outcome = checker.check_fact("Masks cause lung damage").await.unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.kind, FactCheckKind::None);

        let empty = checker.check_fact("   ").await.unwrap();
        assert_eq!(empty.message.as_deref(), Some("Claim is required."));
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_unavailable() {
        let checker = FactChecker::new(
            GoogleFactCheckClient::new(Some("key".into()), ApiCircuitBreakerConfig::default())
                .with_base_url("http://127.0.0.1:9/claims:search"),
            NewsApiClient::new(None, ApiCircuitBreakerConfig::default()),
        );
        let outcome = checker.check_fact("Vaccines cause autism").await.unwrap();
        assert_eq!(outcome, FactCheckOutcome::unavailable());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_live_fact_check() {
        let checker = FactChecker::from_keys(
            std::env::var("FACT_CHECK_API_KEY").ok(),
            std::env::var("NEWS_API_KEY").ok(),
            ApiCircuitBreakerConfig::default(),
        );
        let outcome = checker.check_fact("Vaccines cause autism").await.unwrap();
        println!("{:?}", outcome);
    }
}
