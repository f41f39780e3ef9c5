use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default = "default_chains")]
    pub chains: BTreeMap<String, ChainEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            monitoring: MonitoringConfig::default(),
            api: ApiConfig::default(),
            registry: RegistryConfig::default(),
            chains: default_chains(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_listen: Option<String>,
}

/// Off-chain collaborators: the registry metadata API and the token price
/// API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_prices_url")]
    pub prices_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            prices_url: default_prices_url(),
        }
    }
}

/// The one organization whose registry minions are worth looking up. Any
/// other organization short-circuits the minion query entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_uberhaus_address")]
    pub uberhaus_address: String,
    #[serde(default = "default_minion_type")]
    pub minion_type: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            uberhaus_address: default_uberhaus_address(),
            minion_type: default_minion_type(),
        }
    }
}

/// One supported chain, keyed in `[chains]` by its hex chain id.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainEntry {
    pub name: String,
    pub network: String,
    pub network_id: u64,
    pub subgraph_url: String,
    #[serde(default)]
    pub stats_graph_url: Option<String>,
    #[serde(default)]
    pub hub_sort_order: u32,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metadata_url() -> String {
    "https://data.daohaus.club/dao".to_string()
}

fn default_prices_url() -> String {
    "https://data.daohaus.club/dao-tokens".to_string()
}

fn default_uberhaus_address() -> String {
    "0xf5d6b637a9185707f52d40d452956ca49018247a".to_string()
}

fn default_minion_type() -> String {
    "UberHaus minion".to_string()
}

fn default_chains() -> BTreeMap<String, ChainEntry> {
    let mut chains = BTreeMap::new();
    chains.insert(
        "0x1".to_string(),
        ChainEntry {
            name: "Ethereum Mainnet".to_string(),
            network: "mainnet".to_string(),
            network_id: 1,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus"
                .to_string(),
            stats_graph_url: Some(
                "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats"
                    .to_string(),
            ),
            hub_sort_order: 1,
        },
    );
    chains.insert(
        "0x64".to_string(),
        ChainEntry {
            name: "Gnosis Chain".to_string(),
            network: "gnosis".to_string(),
            network_id: 100,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-xdai"
                .to_string(),
            stats_graph_url: Some(
                "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats-xdai"
                    .to_string(),
            ),
            hub_sort_order: 2,
        },
    );
    chains.insert(
        "0x89".to_string(),
        ChainEntry {
            name: "Polygon".to_string(),
            network: "matic".to_string(),
            network_id: 137,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-matic"
                .to_string(),
            stats_graph_url: Some(
                "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats-matic"
                    .to_string(),
            ),
            hub_sort_order: 3,
        },
    );
    chains.insert(
        "0xa4b1".to_string(),
        ChainEntry {
            name: "Arbitrum One".to_string(),
            network: "arbitrum".to_string(),
            network_id: 42161,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-arbitrum"
                .to_string(),
            stats_graph_url: None,
            hub_sort_order: 4,
        },
    );
    chains
}
