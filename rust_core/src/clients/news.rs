use super::http_client;
use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig};
use crate::models::{FactCheckOutcome, NewsArticle};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    description: Option<String>,
    source: Option<NewsSource>,
    #[serde(default)]
    url: Option<String>,
    published_at: Option<String>,
    url_to_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsSource {
    name: Option<String>,
}

impl From<NewsApiArticle> for NewsArticle {
    fn from(a: NewsApiArticle) -> Self {
        Self {
            title: a.title.unwrap_or_default(),
            description: a.description,
            source: a.source.and_then(|s| s.name),
            url: a.url.unwrap_or_default(),
            published_at: a.published_at,
            image_url: a.url_to_image,
        }
    }
}

/// NewsAPI `everything` search, used when no fact check exists for a claim
#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    circuit_breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("configured", &self.api_key.is_some())
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(api_key: Option<String>, config: ApiCircuitBreakerConfig) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: NEWS_API_URL.to_string(),
            circuit_breaker: Arc::new(ApiCircuitBreaker::new("news", config)),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Articles matching any of `keywords`
    pub async fn search(&self, keywords: &[String], max_results: usize) -> Result<FactCheckOutcome> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(FactCheckOutcome::not_found("News search is not configured."));
        };
        if keywords.is_empty() {
            return Ok(FactCheckOutcome::not_found("No relevant articles found."));
        }

        let query = keywords.join(" OR ");
        debug!("Searching news for \"{}\"", query);
        let articles = self
            .circuit_breaker
            .call(self.search_internal(&query, api_key, max_results))
            .await?;

        if articles.is_empty() {
            return Ok(FactCheckOutcome::not_found("No relevant articles found."));
        }
        Ok(FactCheckOutcome::articles(articles))
    }

    async fn search_internal(
        &self,
        query: &str,
        api_key: &str,
        max_results: usize,
    ) -> Result<Vec<NewsArticle>> {
        let page_size = max_results.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("language", "en"),
                ("sortBy", "relevancy"),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .context("news request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("news API returned status: {}", resp.status()));
        }
        let body: NewsResponse = resp.json().await.context("invalid news payload")?;
        Ok(parse_articles(body))
    }
}

fn parse_articles(body: NewsResponse) -> Vec<NewsArticle> {
    body.articles
        .into_iter()
        .map(NewsArticle::from)
        .filter(|a| !a.title.is_empty() && !a.url.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_articles() {
        let body: NewsResponse = serde_json::from_str(
            r#"{
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": { "id": null, "name": "Reuters" },
                        "title": "Fact check: masks do not cause lung damage",
                        "description": "Doctors explain",
                        "url": "https://example.org/a",
                        "urlToImage": "https://example.org/a.jpg",
                        "publishedAt": "2024-01-01T00:00:00Z"
                    },
                    { "source": { "name": "Blog" }, "title": "[Removed]", "url": null }
                ]
            }"#,
        )
        .unwrap();
        let articles = parse_articles(body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source.as_deref(), Some("Reuters"));
        assert_eq!(articles[0].image_url.as_deref(), Some("https://example.org/a.jpg"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_degrades() {
        let client = NewsApiClient::new(None, ApiCircuitBreakerConfig::default());
        let outcome = client.search(&["masks".to_string()], 5).await.unwrap();
        assert!(!outcome.found);
        assert!(!client.is_configured());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_live_search() {
        let client = NewsApiClient::new(
            std::env::var("NEWS_API_KEY").ok(),
            ApiCircuitBreakerConfig::default(),
        );
        let outcome = client.search(&["vaccines".to_string()], 3).await.unwrap();
        println!("{:?}", outcome);
    }
}
