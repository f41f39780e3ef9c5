//! Token price source consumed by the explore-variant organization resolver.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct TokenPrice {
    #[serde(default)]
    pub price: f64,
}

/// Lowercased token address -> latest USD price.
pub type PriceMap = HashMap<String, TokenPrice>;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("price endpoint returned status {0}")]
    ApiStatus(reqwest::StatusCode),
}

/// Fetches token prices. Explore orchestrations call this exactly once per
/// call.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<PriceMap, PriceError>;
}

#[derive(Clone, Debug)]
pub struct HttpPriceSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpPriceSource {
    pub fn new(client: reqwest::Client, url: String, timeout_ms: u64) -> Self {
        Self {
            client,
            url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch(&self) -> Result<PriceMap, PriceError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::ApiStatus(status));
        }
        let raw: PriceMap = response.json().await?;
        // Downstream joins are on lowercased token addresses.
        let map: PriceMap = raw
            .into_iter()
            .map(|(address, price)| (address.to_lowercase(), price))
            .collect();
        debug!(target: "prices", tokens = map.len(), "token prices fetched");
        Ok(map)
    }
}
