//! Cross-chain fan-out: one task per chain, metadata join, visibility
//! filter, and merge-as-completed accumulation into caller-owned state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::api::{GraphError, GraphTransport, PAGE_SIZE, PagedRequest, fetch_all, queries, subfield_items};
use crate::chains::{ChainConfig, EndpointKind, build_cross_chain_query};
use crate::config::ChainEntry;
use crate::meta::{MetaError, MetaFetcher, MetaMap, meta_lookup};
use crate::prices::{PriceError, PriceMap, PriceSource};
use crate::resolver::{ProposalFields, dao_resolver, proposal_resolver};
use crate::state::Sink;

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("metadata fetch failed: {0}")]
    Meta(#[from] MetaError),
    #[error("price fetch failed: {0}")]
    Prices(#[from] PriceError),
}

/// One chain's contribution to the hub result: the chain descriptor plus its
/// filtered, metadata-joined records.
#[derive(Debug, Clone, Serialize)]
pub struct ChainRecords {
    #[serde(flatten)]
    pub chain: ChainConfig,
    pub data: Vec<Value>,
}

/// Accumulating explore result: every chain that has completed so far plus
/// the merged record stream.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ExploreState {
    pub chains: Vec<ChainConfig>,
    pub data: Vec<Value>,
}

pub struct CrossChainOrchestrator {
    transport: Arc<dyn GraphTransport>,
    chains: BTreeMap<String, ChainEntry>,
}

impl CrossChainOrchestrator {
    pub fn new(transport: Arc<dyn GraphTransport>, chains: BTreeMap<String, ChainEntry>) -> Self {
        Self { transport, chains }
    }

    /// Registry-indexed variant: one non-paginated hub query per chain.
    ///
    /// Metadata is resolved once up front (and published to `api_sink` when
    /// supplied). Chains run as independent tasks with no ordering; each
    /// completion merges into `sink` through a read-modify-write update, and
    /// a failed chain is logged and skipped without touching its siblings.
    pub async fn hub_query(
        &self,
        member_address: &str,
        meta_fetcher: &dyn MetaFetcher,
        sink: Arc<dyn Sink<Vec<ChainRecords>>>,
        api_sink: Option<Arc<dyn Sink<MetaMap>>>,
    ) -> Result<(), OrchestrateError> {
        let meta = Arc::new(meta_fetcher.fetch().await?);
        if let Some(api_sink) = api_sink {
            api_sink.set((*meta).clone());
        }

        let mut tasks = JoinSet::new();
        for chain in build_cross_chain_query(&self.chains, EndpointKind::Subgraph) {
            let transport = Arc::clone(&self.transport);
            let meta = Arc::clone(&meta);
            let member = member_address.to_string();
            tasks.spawn(async move {
                let result = hub_chain_task(transport.as_ref(), &chain, &member, &meta).await;
                (chain, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((chain, result)) = joined else {
                warn!(target: "orchestrator", "hub chain task panicked; skipping");
                continue;
            };
            match result {
                Ok(data) => {
                    debug!(
                        target: "orchestrator",
                        chain = %chain.name,
                        records = data.len(),
                        "hub chain complete"
                    );
                    let records = ChainRecords { chain, data };
                    sink.merge(Box::new(move |prev| {
                        let mut next = prev.clone();
                        next.push(records);
                        next
                    }));
                }
                Err(err) => warn!(
                    target: "orchestrator",
                    chain = %chain.name,
                    error = %err,
                    "hub chain query failed; skipping chain"
                ),
            }
        }
        Ok(())
    }

    /// Exploration variant: full pagination of the listing per chain, with
    /// records resolved against externally fetched token prices. Same fan-out
    /// and merge discipline as [`Self::hub_query`]; the visibility filter
    /// here has no summoner exception.
    pub async fn explore_query(
        &self,
        meta_fetcher: &dyn MetaFetcher,
        price_source: &dyn PriceSource,
        sink: Arc<dyn Sink<ExploreState>>,
    ) -> Result<(), OrchestrateError> {
        let meta = Arc::new(meta_fetcher.fetch().await?);
        let prices = Arc::new(price_source.fetch().await?);

        let mut tasks = JoinSet::new();
        for chain in build_cross_chain_query(&self.chains, EndpointKind::Subgraph) {
            let transport = Arc::clone(&self.transport);
            let meta = Arc::clone(&meta);
            let prices = Arc::clone(&prices);
            tasks.spawn(async move {
                let result = explore_chain_task(transport.as_ref(), &chain, &meta, &prices).await;
                (chain, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((chain, result)) = joined else {
                warn!(target: "orchestrator", "explore chain task panicked; skipping");
                continue;
            };
            match result {
                Ok(data) => {
                    debug!(
                        target: "orchestrator",
                        chain = %chain.name,
                        records = data.len(),
                        "explore chain complete"
                    );
                    sink.merge(Box::new(move |prev| {
                        let mut next = prev.clone();
                        next.chains.push(chain);
                        next.data.extend(data);
                        next
                    }));
                }
                Err(err) => warn!(
                    target: "orchestrator",
                    chain = %chain.name,
                    error = %err,
                    "explore chain query failed; skipping chain"
                ),
            }
        }
        Ok(())
    }
}

async fn hub_chain_task(
    transport: &dyn GraphTransport,
    chain: &ChainConfig,
    member_address: &str,
    meta: &MetaMap,
) -> Result<Vec<Value>, GraphError> {
    let data = transport
        .query(
            &chain.endpoint,
            queries::MEMBERS_HUB,
            json!({ "memberAddress": member_address }),
        )
        .await?;
    let records = subfield_items(&data, "membersHub")?;

    let joined = records
        .into_iter()
        .filter_map(|record| {
            let mut record = record.as_object().cloned()?;
            let mut moloch = record.get("moloch")?.as_object().cloned()?;

            if let Some(Value::Array(proposals)) = moloch.remove("proposals") {
                let resolved: Vec<Value> = proposals
                    .iter()
                    .map(|proposal| proposal_resolver(proposal, &ProposalFields::HUB))
                    .collect();
                moloch.insert("proposals".to_string(), Value::Array(resolved));
            }

            let dao_id = moloch.get("id").and_then(Value::as_str)?.to_string();
            let summoner = moloch
                .get("summoner")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            record.insert("moloch".to_string(), Value::Object(moloch));

            let meta_record = meta_lookup(meta, &dao_id, &chain.api_match);
            // Keep a registered, unhidden organization; or, with no registry
            // entry at all, an organization the requesting member summoned
            // (implicit, not-yet-registered, visible).
            let keep = match meta_record {
                Some(meta_record) => !meta_record.hide,
                None => member_address.eq_ignore_ascii_case(&summoner),
            };
            if !keep {
                return None;
            }

            record.insert(
                "meta".to_string(),
                meta_record
                    .and_then(|m| serde_json::to_value(m).ok())
                    .unwrap_or(Value::Null),
            );
            Some(Value::Object(record))
        })
        .collect();
    Ok(joined)
}

async fn explore_chain_task(
    transport: &dyn GraphTransport,
    chain: &ChainConfig,
    meta: &MetaMap,
    prices: &PriceMap,
) -> Result<Vec<Value>, GraphError> {
    let request = PagedRequest {
        endpoint: chain.endpoint.clone(),
        document: queries::EXPLORER_DAOS,
        variables: serde_json::Map::new(),
        subfield: "moloches",
    };
    let listings = fetch_all(transport, &request, PAGE_SIZE).await?;

    let joined = listings
        .iter()
        .filter_map(|raw| {
            let dao_id = raw.get("id").and_then(Value::as_str)?;
            let meta_record = meta_lookup(meta, dao_id, &chain.api_match);
            // No summoner exception here: unregistered listings are public.
            if meta_record.is_some_and(|m| m.hide) {
                return None;
            }

            let mut resolved = dao_resolver(raw, prices, chain);
            if let Some(obj) = resolved.as_object_mut() {
                obj.insert(
                    "meta".to_string(),
                    meta_record
                        .and_then(|m| serde_json::to_value(m).ok())
                        .unwrap_or(Value::Null),
                );
            }
            Some(resolved)
        })
        .collect();
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::meta::MetaRecord;
    use crate::prices::TokenPrice;
    use crate::state::StateCell;

    /// Routes each call by endpoint, replaying a scripted queue per chain.
    struct RoutedTransport {
        routes: Mutex<HashMap<String, VecDeque<Result<Value, String>>>>,
    }

    impl RoutedTransport {
        fn new(routes: Vec<(&str, Vec<Result<Value, String>>)>) -> Self {
            Self {
                routes: Mutex::new(
                    routes
                        .into_iter()
                        .map(|(endpoint, responses)| (endpoint.to_string(), responses.into()))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl GraphTransport for RoutedTransport {
        async fn query(
            &self,
            endpoint: &str,
            _document: &str,
            _variables: Value,
        ) -> Result<Value, GraphError> {
            // Yield first so chain tasks genuinely interleave.
            tokio::task::yield_now().await;
            let next = self
                .routes
                .lock()
                .expect("routed transport lock")
                .get_mut(endpoint)
                .unwrap_or_else(|| panic!("no route for {endpoint}"))
                .pop_front()
                .unwrap_or_else(|| panic!("route for {endpoint} exhausted"));
            next.map_err(GraphError::Service)
        }
    }

    struct FakeMetaFetcher {
        map: MetaMap,
        calls: AtomicUsize,
    }

    impl FakeMetaFetcher {
        fn new(map: MetaMap) -> Self {
            Self {
                map,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetaFetcher for FakeMetaFetcher {
        async fn fetch(&self) -> Result<MetaMap, MetaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.map.clone())
        }
    }

    struct FakePriceSource {
        prices: PriceMap,
        calls: AtomicUsize,
    }

    impl FakePriceSource {
        fn new(prices: PriceMap) -> Self {
            Self {
                prices,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceSource for FakePriceSource {
        async fn fetch(&self) -> Result<PriceMap, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.prices.clone())
        }
    }

    fn chain_entry(name: &str, network: &str, network_id: u64, endpoint: &str) -> ChainEntry {
        ChainEntry {
            name: name.to_string(),
            network: network.to_string(),
            network_id,
            subgraph_url: endpoint.to_string(),
            stats_graph_url: None,
            hub_sort_order: 0,
        }
    }

    fn three_chain_registry() -> BTreeMap<String, ChainEntry> {
        let mut chains = BTreeMap::new();
        chains.insert(
            "0x1".to_string(),
            chain_entry("Chain A", "mainnet", 1, "http://indexer.test/a"),
        );
        chains.insert(
            "0x64".to_string(),
            chain_entry("Chain B", "gnosis", 100, "http://indexer.test/b"),
        );
        chains.insert(
            "0x89".to_string(),
            chain_entry("Chain C", "matic", 137, "http://indexer.test/c"),
        );
        chains
    }

    fn meta_record(network: &str, hide: bool) -> MetaRecord {
        MetaRecord {
            network: network.to_string(),
            hide,
            extra: serde_json::Map::new(),
        }
    }

    fn hub_record(dao_id: &str, summoner: &str) -> Value {
        json!({
            "id": format!("{dao_id}-member"),
            "memberAddress": "0xmember",
            "moloch": {
                "id": dao_id,
                "summoner": summoner,
                "title": "a dao",
                "proposals": [
                    { "details": "{\"title\":\"p\"}", "sponsored": true }
                ]
            }
        })
    }

    #[tokio::test]
    async fn hub_survives_one_failing_chain() {
        let transport = Arc::new(RoutedTransport::new(vec![
            (
                "http://indexer.test/a",
                vec![Ok(json!({ "membersHub": [hub_record("0xdao-a", "0xmember")] }))],
            ),
            (
                "http://indexer.test/b",
                vec![Err("chain b indexer down".to_string())],
            ),
            (
                "http://indexer.test/c",
                vec![Ok(json!({ "membersHub": [hub_record("0xdao-c", "0xmember")] }))],
            ),
        ]));
        let orchestrator = CrossChainOrchestrator::new(transport, three_chain_registry());
        let sink: StateCell<Vec<ChainRecords>> = StateCell::default();
        let meta = FakeMetaFetcher::new(MetaMap::new());

        orchestrator
            .hub_query("0xMEMBER", &meta, Arc::new(sink.clone()), None)
            .await
            .unwrap();

        let result = sink.snapshot();
        assert_eq!(result.len(), 2);
        let mut names: Vec<&str> = result.iter().map(|r| r.chain.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Chain A", "Chain C"]);
        assert_eq!(meta.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn out_of_order_completions_lose_no_chain() {
        // Chain A answers slowly, chain C immediately; C's merge lands first
        // and A's must still arrive on top of it.
        struct DelayedTransport {
            inner: RoutedTransport,
            slow_endpoint: &'static str,
        }

        #[async_trait]
        impl GraphTransport for DelayedTransport {
            async fn query(
                &self,
                endpoint: &str,
                document: &str,
                variables: Value,
            ) -> Result<Value, GraphError> {
                if endpoint == self.slow_endpoint {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
                self.inner.query(endpoint, document, variables).await
            }
        }

        let transport = Arc::new(DelayedTransport {
            inner: RoutedTransport::new(vec![
                (
                    "http://indexer.test/a",
                    vec![Ok(json!({ "membersHub": [hub_record("0xdao-a", "0xmember")] }))],
                ),
                (
                    "http://indexer.test/c",
                    vec![Ok(json!({ "membersHub": [hub_record("0xdao-c", "0xmember")] }))],
                ),
            ]),
            slow_endpoint: "http://indexer.test/a",
        });

        let mut chains = BTreeMap::new();
        chains.insert(
            "0x1".to_string(),
            chain_entry("Chain A", "mainnet", 1, "http://indexer.test/a"),
        );
        chains.insert(
            "0x89".to_string(),
            chain_entry("Chain C", "matic", 137, "http://indexer.test/c"),
        );
        let orchestrator = CrossChainOrchestrator::new(transport, chains);
        let sink: StateCell<Vec<ChainRecords>> = StateCell::default();
        let meta = FakeMetaFetcher::new(MetaMap::new());

        orchestrator
            .hub_query("0xmember", &meta, Arc::new(sink.clone()), None)
            .await
            .unwrap();

        let result = sink.snapshot();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].chain.name, "Chain C");
        assert_eq!(result[1].chain.name, "Chain A");
    }

    #[tokio::test]
    async fn hub_filter_applies_summoner_exception() {
        let mut meta_map = MetaMap::new();
        meta_map.insert("0xhidden".to_string(), vec![meta_record("mainnet", true)]);
        meta_map.insert("0xlisted".to_string(), vec![meta_record("mainnet", false)]);

        let mut chains = BTreeMap::new();
        chains.insert(
            "0x1".to_string(),
            chain_entry("Chain A", "mainnet", 1, "http://indexer.test/a"),
        );
        let transport = Arc::new(RoutedTransport::new(vec![(
            "http://indexer.test/a",
            vec![Ok(json!({
                "membersHub": [
                    hub_record("0xhidden", "0xmember"),
                    hub_record("0xlisted", "0xsomeoneelse"),
                    hub_record("0xunregistered-mine", "0xmember"),
                    hub_record("0xunregistered-other", "0xsomeoneelse"),
                ]
            }))],
        )]));
        let orchestrator = CrossChainOrchestrator::new(transport, chains);
        let sink: StateCell<Vec<ChainRecords>> = StateCell::default();
        let meta = FakeMetaFetcher::new(meta_map);

        orchestrator
            .hub_query("0xMember", &meta, Arc::new(sink.clone()), None)
            .await
            .unwrap();

        let result = sink.snapshot();
        assert_eq!(result.len(), 1);
        let ids: Vec<&str> = result[0]
            .data
            .iter()
            .map(|r| r["moloch"]["id"].as_str().unwrap())
            .collect();
        // hidden registry entry excluded; unregistered kept only for the
        // requesting summoner (case-insensitive)
        assert_eq!(ids, vec!["0xlisted", "0xunregistered-mine"]);
        assert!(result[0].data[0]["meta"].is_object());
        assert!(result[0].data[1]["meta"].is_null());
        // hub projection replaces raw proposals with the resolved field set
        let proposal = &result[0].data[0]["moloch"]["proposals"][0];
        assert_eq!(proposal["title"], "p");
        assert!(proposal.get("sponsored").is_none());
    }

    #[tokio::test]
    async fn hub_publishes_metadata_to_api_sink_once() {
        let mut meta_map = MetaMap::new();
        meta_map.insert("0xdao".to_string(), vec![meta_record("mainnet", false)]);

        let mut chains = BTreeMap::new();
        chains.insert(
            "0x1".to_string(),
            chain_entry("Chain A", "mainnet", 1, "http://indexer.test/a"),
        );
        let transport = Arc::new(RoutedTransport::new(vec![(
            "http://indexer.test/a",
            vec![Ok(json!({ "membersHub": [] }))],
        )]));
        let orchestrator = CrossChainOrchestrator::new(transport, chains);
        let sink: StateCell<Vec<ChainRecords>> = StateCell::default();
        let api_sink: StateCell<MetaMap> = StateCell::default();
        let meta = FakeMetaFetcher::new(meta_map);

        orchestrator
            .hub_query(
                "0xmember",
                &meta,
                Arc::new(sink.clone()),
                Some(Arc::new(api_sink.clone())),
            )
            .await
            .unwrap();

        assert_eq!(meta.calls.load(Ordering::SeqCst), 1);
        assert!(api_sink.snapshot().contains_key("0xdao"));
    }

    fn explore_listing(dao_id: &str) -> Value {
        json!({
            "id": dao_id,
            "title": format!("dao {dao_id}"),
            "summoner": "0xsummoner",
            "members": [{ "id": "m1" }],
            "tokenBalances": [{
                "tokenBalance": "1000000000000000000",
                "token": { "tokenAddress": "0xtoken", "decimals": "18" }
            }]
        })
    }

    #[tokio::test]
    async fn explore_filters_hidden_and_prices_records() {
        let mut meta_map = MetaMap::new();
        meta_map.insert("0xhidden".to_string(), vec![meta_record("xdai", true)]);
        meta_map.insert("0xlisted".to_string(), vec![meta_record("xdai", false)]);

        let mut chains = BTreeMap::new();
        chains.insert(
            "0x64".to_string(),
            chain_entry("Gnosis Chain", "gnosis", 100, "http://indexer.test/xdai"),
        );
        let transport = Arc::new(RoutedTransport::new(vec![(
            "http://indexer.test/xdai",
            vec![Ok(json!({
                "moloches": [
                    explore_listing("0xhidden"),
                    explore_listing("0xlisted"),
                    explore_listing("0xunregistered"),
                ]
            }))],
        )]));
        let orchestrator = CrossChainOrchestrator::new(transport, chains);
        let sink: StateCell<ExploreState> = StateCell::default();
        let meta = FakeMetaFetcher::new(meta_map);
        let mut prices = PriceMap::new();
        prices.insert("0xtoken".to_string(), TokenPrice { price: 3.0 });
        let prices = FakePriceSource::new(prices);

        orchestrator
            .explore_query(&meta, &prices, Arc::new(sink.clone()))
            .await
            .unwrap();

        let state = sink.snapshot();
        assert_eq!(state.chains.len(), 1);
        // 0x64 joins the registry on the legacy xdai key
        assert_eq!(state.chains[0].api_match, "xdai");
        let ids: Vec<&str> = state
            .data
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["0xlisted", "0xunregistered"]);
        assert_eq!(state.data[0]["guildBankValue"], 3.0);
        assert_eq!(meta.calls.load(Ordering::SeqCst), 1);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explore_paginates_each_chain_fully() {
        let first_page: Vec<Value> = (0..100)
            .map(|n| explore_listing(&format!("0xdao-{n}")))
            .collect();
        let transport = Arc::new(RoutedTransport::new(vec![(
            "http://indexer.test/a",
            vec![
                Ok(json!({ "moloches": first_page })),
                Ok(json!({ "moloches": [explore_listing("0xdao-100")] })),
            ],
        )]));
        let mut chains = BTreeMap::new();
        chains.insert(
            "0x1".to_string(),
            chain_entry("Chain A", "mainnet", 1, "http://indexer.test/a"),
        );
        let orchestrator = CrossChainOrchestrator::new(transport, chains);
        let sink: StateCell<ExploreState> = StateCell::default();
        let meta = FakeMetaFetcher::new(MetaMap::new());
        let prices = FakePriceSource::new(PriceMap::new());

        orchestrator
            .explore_query(&meta, &prices, Arc::new(sink.clone()))
            .await
            .unwrap();

        let state = sink.snapshot();
        assert_eq!(state.data.len(), 101);
        assert_eq!(state.data[0]["id"], "0xdao-0");
        assert_eq!(state.data[100]["id"], "0xdao-100");
    }
}
