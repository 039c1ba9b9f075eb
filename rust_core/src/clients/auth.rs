use super::AuthTokenProvider;
use anyhow::Result;
use async_trait::async_trait;
use std::env;

/// Fixed token, or none at all
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl AuthTokenProvider for StaticTokenProvider {
    async fn auth_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new("AUTH_TOKEN")
    }
}

#[async_trait]
impl AuthTokenProvider for EnvTokenProvider {
    async fn auth_token(&self) -> Result<Option<String>> {
        Ok(env::var(&self.var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.auth_token().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(StaticTokenProvider::anonymous().auth_token().await.unwrap(), None);
    }

    #[test]
    fn test_env_provider_missing_var() {
        let provider = EnvTokenProvider::new("MODSIM_TEST_TOKEN_THAT_IS_NEVER_SET");
        let token = tokio_test::block_on(provider.auth_token()).unwrap();
        assert_eq!(token, None);
    }
}
