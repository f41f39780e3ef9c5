//! Single-organization aggregation: overview, activity, members, balances
//! and the registry minion lookup, dispatched as one concurrent batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::api::{GraphError, GraphTransport, PAGE_SIZE, PagedRequest, fetch_all, queries};
use crate::chains::{EndpointKind, graph_endpoint};
use crate::config::{ChainEntry, RegistryConfig};
use crate::resolver::{ProposalFields, proposal_resolver};
use crate::state::Sink;

/// Scope of one aggregation batch: which chain, which organization, and the
/// optional member/minion identities some queries need.
#[derive(Debug, Clone)]
pub struct DaoQueryArgs {
    pub chain_id: String,
    pub dao_address: String,
    pub member_address: Option<String>,
    pub minion_id: Option<String>,
}

/// Consumer slots for the activity aggregate. Fan-out is best-effort: a slot
/// that was not supplied is skipped, not an error.
#[derive(Default, Clone)]
pub struct ActivityConsumers {
    pub activities: Option<Arc<dyn Sink<Value>>>,
    pub proposals: Option<Arc<dyn Sink<Value>>>,
    pub uber_proposals: Option<Arc<dyn Sink<Value>>>,
    pub uber_activities: Option<Arc<dyn Sink<Value>>>,
}

/// One aggregator paired with its consumer(s). The enum replaces the legacy
/// string-keyed dispatch table; an unknown aggregator name is
/// unrepresentable.
pub enum AggregatorTask {
    Overview(Arc<dyn Sink<Value>>),
    Activities(ActivityConsumers),
    Members(Arc<dyn Sink<Value>>),
    BankBalances(Arc<dyn Sink<Value>>),
    UberHausData(Arc<dyn Sink<Value>>),
    UberMinions(Arc<dyn Sink<Value>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    Overview,
    Activities,
    Members,
    BankBalances,
    UberHausData,
    UberMinions,
}

impl AggregatorTask {
    pub fn kind(&self) -> AggregatorKind {
        match self {
            AggregatorTask::Overview(_) => AggregatorKind::Overview,
            AggregatorTask::Activities(_) => AggregatorKind::Activities,
            AggregatorTask::Members(_) => AggregatorKind::Members,
            AggregatorTask::BankBalances(_) => AggregatorKind::BankBalances,
            AggregatorTask::UberHausData(_) => AggregatorKind::UberHausData,
            AggregatorTask::UberMinions(_) => AggregatorKind::UberMinions,
        }
    }
}

pub struct DaoAggregator {
    transport: Arc<dyn GraphTransport>,
    chains: BTreeMap<String, ChainEntry>,
    registry: RegistryConfig,
}

impl DaoAggregator {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        chains: BTreeMap<String, ChainEntry>,
        registry: RegistryConfig,
    ) -> Self {
        Self {
            transport,
            chains,
            registry,
        }
    }

    /// Runs every task in the batch independently and concurrently.
    /// Aggregators never depend on each other's results; one failure is
    /// logged and reported in the returned pair without touching its
    /// siblings.
    pub async fn dispatch(
        &self,
        args: &DaoQueryArgs,
        tasks: Vec<AggregatorTask>,
    ) -> Vec<(AggregatorKind, Result<(), GraphError>)> {
        join_all(tasks.into_iter().map(|task| self.run_task(args, task))).await
    }

    async fn run_task(
        &self,
        args: &DaoQueryArgs,
        task: AggregatorTask,
    ) -> (AggregatorKind, Result<(), GraphError>) {
        let kind = task.kind();
        let result = match task {
            AggregatorTask::Overview(sink) => {
                self.fetch_overview(args).await.map(|overview| {
                    sink.set(overview);
                })
            }
            AggregatorTask::Activities(consumers) => {
                self.fetch_activities(args).await.map(|activity| {
                    let proposals = activity
                        .get("proposals")
                        .cloned()
                        .unwrap_or_else(|| json!([]));
                    if let Some(sink) = &consumers.activities {
                        sink.set(activity.clone());
                    }
                    if let Some(sink) = &consumers.proposals {
                        sink.set(proposals.clone());
                    }
                    if let Some(sink) = &consumers.uber_proposals {
                        sink.set(proposals.clone());
                    }
                    if let Some(sink) = &consumers.uber_activities {
                        sink.set(proposals);
                    }
                })
            }
            AggregatorTask::Members(sink) => {
                self.fetch_members(args).await.map(|members| {
                    sink.set(members);
                })
            }
            AggregatorTask::BankBalances(sink) => {
                self.fetch_bank_values(args).await.map(|balances| {
                    sink.set(balances);
                })
            }
            AggregatorTask::UberHausData(sink) => {
                self.fetch_uberhaus_data(args).await.map(|data| {
                    sink.set(data);
                })
            }
            AggregatorTask::UberMinions(sink) => {
                self.fetch_uber_minions(args).await.map(|minions| {
                    sink.set(minions);
                })
            }
        };
        if let Err(err) = &result {
            warn!(
                target: "aggregator",
                kind = ?kind,
                chain = %args.chain_id,
                dao = %args.dao_address,
                error = %err,
                "aggregator failed"
            );
        }
        (kind, result)
    }

    /// One non-paginated overview query; yields the raw organization record.
    pub async fn fetch_overview(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Subgraph)?;
        let data = self
            .transport
            .query(
                &endpoint,
                queries::HOME_DAO,
                json!({ "contractAddr": args.dao_address }),
            )
            .await?;
        moloch_object(&data).map(|obj| Value::Object(obj.clone()))
    }

    /// Full pagination of the proposal feed. The organization shell from the
    /// first page is kept; proposals accumulate across pages in arrival
    /// order and are projected through the resolver before fan-out.
    pub async fn fetch_activities(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Subgraph)?;
        let mut shell: Option<Map<String, Value>> = None;
        let mut proposals: Vec<Value> = Vec::new();
        let mut skip = 0usize;
        loop {
            let data = self
                .transport
                .query(
                    &endpoint,
                    queries::DAO_ACTIVITIES,
                    json!({ "contractAddr": args.dao_address, "skip": skip }),
                )
                .await?;
            let mut moloch = moloch_object(&data)?.clone();
            let page = match moloch.remove("proposals") {
                Some(Value::Array(page)) => page,
                _ => return Err(GraphError::Shape("proposals".to_string())),
            };
            if shell.is_none() {
                shell = Some(moloch);
            }
            let page_len = page.len();
            proposals.extend(page);
            if page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }

        debug!(
            target: "aggregator",
            dao = %args.dao_address,
            proposals = proposals.len(),
            "activity feed fetched"
        );

        let resolved: Vec<Value> = proposals
            .iter()
            .map(|proposal| proposal_resolver(proposal, &ProposalFields::ACTIVITY))
            .collect();
        let mut activity = shell.unwrap_or_default();
        activity.insert("proposals".to_string(), Value::Array(resolved));
        Ok(Value::Object(activity))
    }

    /// Full pagination of the member list; raw records, no projection.
    pub async fn fetch_members(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Subgraph)?;
        let request = PagedRequest {
            endpoint,
            document: queries::MEMBERS_LIST,
            variables: object_variables(json!({ "contractAddr": args.dao_address })),
            subfield: "daoMembers",
        };
        let members = fetch_all(self.transport.as_ref(), &request, PAGE_SIZE).await?;
        Ok(Value::Array(members))
    }

    /// Full pagination of bank balances against the stats endpoint.
    pub async fn fetch_bank_values(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Stats)?;
        let request = PagedRequest {
            endpoint,
            document: queries::BANK_BALANCES,
            variables: object_variables(json!({ "molochAddress": args.dao_address })),
            subfield: "balances",
        };
        let balances = fetch_all(self.transport.as_ref(), &request, PAGE_SIZE).await?;
        Ok(Value::Array(balances))
    }

    /// One non-paginated federated membership query.
    pub async fn fetch_uberhaus_data(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Subgraph)?;
        self.transport
            .query(
                &endpoint,
                queries::UBERHAUS_QUERY,
                json!({
                    "molochAddress": args.dao_address,
                    "memberAddress": args.member_address.clone().unwrap_or_default(),
                    "minionId": args.minion_id.clone().unwrap_or_default(),
                }),
            )
            .await
    }

    /// Registry minion lookup. Only the configured registry organization has
    /// minions worth fetching; every other organization yields null without
    /// a network call. The comparison is exact: addresses are normalized to
    /// lowercase at the CLI boundary, matching the lowercase registry default.
    pub async fn fetch_uber_minions(&self, args: &DaoQueryArgs) -> Result<Value, GraphError> {
        if args.dao_address != self.registry.uberhaus_address {
            return Ok(Value::Null);
        }
        let endpoint = graph_endpoint(&self.chains, &args.chain_id, EndpointKind::Subgraph)?;
        let data = self
            .transport
            .query(
                &endpoint,
                queries::UBER_MINIONS,
                json!({
                    "molochAddress": args.dao_address,
                    "minionType": self.registry.minion_type,
                }),
            )
            .await?;
        crate::api::subfield_items(&data, "minions").map(Value::Array)
    }
}

fn moloch_object(data: &Value) -> Result<&Map<String, Value>, GraphError> {
    data.get("moloch")
        .and_then(Value::as_object)
        .ok_or_else(|| GraphError::Shape("moloch".to_string()))
}

fn object_variables(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
