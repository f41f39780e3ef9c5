//! Off-chain registry metadata: hide-lists keyed by organization address.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// One registry entry for an organization on one network. Looked up, never
/// mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRecord {
    pub network: String,
    #[serde(default)]
    pub hide: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Organization address -> registry entries, one per network the
/// organization is registered on.
pub type MetaMap = HashMap<String, Vec<MetaRecord>>;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("metadata request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("metadata endpoint returned status {0}")]
    ApiStatus(reqwest::StatusCode),
}

/// Fetches the registry map. Orchestrations call this exactly once, before
/// any per-chain fan-out begins.
#[async_trait]
pub trait MetaFetcher: Send + Sync {
    async fn fetch(&self) -> Result<MetaMap, MetaError>;
}

#[derive(Clone, Debug)]
pub struct HttpMetaFetcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpMetaFetcher {
    pub fn new(client: reqwest::Client, url: String, timeout_ms: u64) -> Self {
        Self {
            client,
            url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl MetaFetcher for HttpMetaFetcher {
    async fn fetch(&self) -> Result<MetaMap, MetaError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetaError::ApiStatus(status));
        }
        let map: MetaMap = response.json().await?;
        debug!(target: "meta", organizations = map.len(), "registry metadata fetched");
        Ok(map)
    }
}

/// Finds the registry entry for `address` on the network named by
/// `api_match`, if any.
pub fn meta_lookup<'a>(map: &'a MetaMap, address: &str, api_match: &str) -> Option<&'a MetaRecord> {
    map.get(address)?
        .iter()
        .find(|record| record.network == api_match)
}
