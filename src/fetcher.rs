use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;

/// Source of raw pool documents. The sync service only sees this seam, so a
/// cycle can run against a scripted provider in tests.
#[async_trait]
pub trait PoolFetcher: Send + Sync {
    /// Fetch one pool by its comma-joined market code. Any transport failure
    /// or non-success status is an error; the body is returned untouched.
    async fn fetch(&self, pool_code: &str) -> Result<Value>;
}

/// HTTP client for the provider's match calculator endpoint.
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProviderClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.provider_url.clone(),
        })
    }
}

#[async_trait]
impl PoolFetcher for ProviderClient {
    async fn fetch(&self, pool_code: &str) -> Result<Value> {
        let url = format!("{}?channel=c&poolCode={}", self.base_url, pool_code);
        debug!(%url, "fetching pool");
        let doc = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(doc)
    }
}
