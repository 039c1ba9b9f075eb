use super::{http_client, send_guarded, AuthTokenProvider, ProfileStore};
use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig};
use crate::models::{GameStatsUpdate, UpgradeState, UserProfile, Wallet};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct UpgradesResponse {
    profile: UserProfile,
}

/// Player profile held by the game backend
#[derive(Clone)]
pub struct HttpProfileStore {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthTokenProvider>,
    circuit_breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for HttpProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProfileStore")
            .field("base_url", &self.base_url)
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl HttpProfileStore {
    pub fn new(
        base_url: &str,
        auth: Arc<dyn AuthTokenProvider>,
        config: ApiCircuitBreakerConfig,
    ) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            circuit_breaker: Arc::new(ApiCircuitBreaker::new("profile", config)),
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .auth
            .auth_token()
            .await?
            .ok_or_else(|| anyhow!("User not authenticated"))?;
        Ok(request.bearer_auth(token))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let request = self.authorized(request).await?;
        let resp = send_guarded(&self.circuit_breaker, request, what).await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Failed to {}: status {}", what, resp.status()));
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("invalid {} response", what))
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn fetch_wallet(&self) -> Result<Wallet> {
        let request = self.client.get(format!("{}/api/protected/money", self.base_url));
        let wallet: Wallet = self.send_json(request, "fetch money").await?;
        debug!("Wallet: {} money, {} upgrades", wallet.money, wallet.upgrades.len());
        Ok(wallet)
    }

    async fn update_user_upgrades(&self, money: i64, upgrades: &UpgradeState) -> Result<UserProfile> {
        let request = self
            .client
            .post(format!("{}/api/protected/upgrades", self.base_url))
            .json(&json!({ "money": money, "upgrades": upgrades }));
        let resp: UpgradesResponse = self.send_json(request, "update upgrades").await?;
        Ok(resp.profile)
    }

    async fn update_user_stats(&self, stats: &GameStatsUpdate) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/api/users/stats", self.base_url))
            .json(&json!({ "stats": stats }));
        let _: serde_json::Value = self.send_json(request, "update stats").await?;
        Ok(())
    }
}
