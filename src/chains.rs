//! Chain registry lookups: endpoint resolution and the per-call chain list
//! used by the cross-chain orchestrator.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::GraphError;
use crate::config::ChainEntry;

/// Which indexer a query targets. The core subgraph carries organizations,
/// members and proposals; the stats subgraph carries bank balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Subgraph,
    Stats,
}

impl EndpointKind {
    fn label(self) -> &'static str {
        match self {
            EndpointKind::Subgraph => "subgraph",
            EndpointKind::Stats => "stats",
        }
    }
}

/// Resolves one chain's endpoint of the given kind from the registry.
pub fn graph_endpoint(
    chains: &BTreeMap<String, ChainEntry>,
    chain_id: &str,
    kind: EndpointKind,
) -> Result<String, GraphError> {
    let entry = chains.get(chain_id).ok_or_else(|| GraphError::UnknownChain {
        chain: chain_id.to_string(),
        kind: kind.label(),
    })?;
    match kind {
        EndpointKind::Subgraph => Ok(entry.subgraph_url.clone()),
        EndpointKind::Stats => {
            entry
                .stats_graph_url
                .clone()
                .ok_or_else(|| GraphError::UnknownChain {
                    chain: chain_id.to_string(),
                    kind: kind.label(),
                })
        }
    }
}

/// One chain of a cross-chain orchestration, built from the registry and
/// immutable for the call's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: String,
    pub network_id: u64,
    pub endpoint: String,
    pub api_match: String,
    pub hub_sort_order: u32,
}

/// Builds the per-call chain list. The registry metadata API indexes Gnosis
/// Chain entries under its legacy `xdai` name, so chain `0x64` joins on that
/// key; every other chain joins on its declared network name. Chains without
/// an endpoint of the requested kind are skipped.
pub fn build_cross_chain_query(
    chains: &BTreeMap<String, ChainEntry>,
    kind: EndpointKind,
) -> Vec<ChainConfig> {
    chains
        .iter()
        .filter_map(|(chain_id, entry)| {
            let endpoint = match kind {
                EndpointKind::Subgraph => entry.subgraph_url.clone(),
                EndpointKind::Stats => entry.stats_graph_url.clone()?,
            };
            let api_match = if chain_id == "0x64" {
                "xdai".to_string()
            } else {
                entry.network.clone()
            };
            Some(ChainConfig {
                name: entry.name.clone(),
                chain_id: chain_id.clone(),
                network_id: entry.network_id,
                endpoint,
                api_match,
                hub_sort_order: entry.hub_sort_order,
            })
        })
        .collect()
}
