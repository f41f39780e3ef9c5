use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["daograph.toml", "config/daograph.toml"];

/// Template written by `daograph init`.
pub const CONFIG_TEMPLATE: &str = r#"[engine]
request_timeout_ms = 10000

[logging]
level = "info"
json = false

[monitoring]
# prometheus_listen = "127.0.0.1:9187"

[api]
metadata_url = "https://data.daohaus.club/dao"
prices_url = "https://data.daohaus.club/dao-tokens"

[registry]
uberhaus_address = "0xf5d6b637a9185707f52d40d452956ca49018247a"
minion_type = "UberHaus minion"

[chains."0x1"]
name = "Ethereum Mainnet"
network = "mainnet"
network_id = 1
subgraph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus"
stats_graph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats"
hub_sort_order = 1

[chains."0x64"]
name = "Gnosis Chain"
network = "gnosis"
network_id = 100
subgraph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-xdai"
stats_graph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats-xdai"
hub_sort_order = 2

[chains."0x89"]
name = "Polygon"
network = "matic"
network_id = 137
subgraph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-matic"
stats_graph_url = "https://api.thegraph.com/subgraphs/name/odyssy-automaton/daohaus-stats-matic"
hub_sort_order = 3
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Loads the first config found at `path` or the default search paths,
/// falling back to built-in defaults when none exists.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(AppConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_into_config() {
        let config: AppConfig = toml::from_str(CONFIG_TEMPLATE).expect("parse template");
        assert_eq!(config.chains.len(), 3);
        assert_eq!(config.chains["0x64"].network, "gnosis");
        assert_eq!(config.registry.minion_type, "UberHaus minion");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/daograph.toml")))
            .expect("load defaults");
        assert_eq!(config.engine.request_timeout_ms, 10_000);
    }
}
