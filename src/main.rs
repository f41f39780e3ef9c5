use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod aggregator;
mod api;
mod chains;
mod config;
mod meta;
mod monitoring;
mod orchestrator;
mod prices;
mod resolver;
mod state;

use aggregator::{ActivityConsumers, AggregatorTask, DaoAggregator, DaoQueryArgs};
use api::{GraphClient, GraphTransport};
use config::{AppConfig, CONFIG_TEMPLATE, load_config};
use meta::HttpMetaFetcher;
use orchestrator::{ChainRecords, CrossChainOrchestrator, ExploreState};
use prices::HttpPriceSource;
use state::StateCell;

#[derive(Parser, Debug)]
#[command(name = "daograph", version, about = "Cross-chain DAO subgraph aggregator")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Config file path (defaults to daograph.toml or config/daograph.toml)"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate one organization: overview, activity, members, balances
    Dao(DaoCmd),
    /// Cross-chain hub memberships for one member address
    Hub(HubCmd),
    /// Cross-chain explore listing with metadata and prices
    Explore,
    /// Write a config template file
    Init(InitCmd),
}

#[derive(Args, Debug)]
struct DaoCmd {
    #[arg(long, help = "Hex chain id, e.g. 0x1 or 0x64")]
    chain: String,
    #[arg(long, help = "Organization contract address")]
    address: String,
    #[arg(long, help = "Member address for federated queries")]
    member: Option<String>,
    #[arg(long, help = "Minion id for federated queries")]
    minion: Option<String>,
}

#[derive(Args, Debug)]
struct HubCmd {
    #[arg(long, help = "Member address to look up across chains")]
    member: String,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "FILE", help = "Target path for the template")]
    path: Option<PathBuf>,
    #[arg(long, help = "Overwrite an existing file")]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;
    init_tracing(&config.logging);
    if let Some(listen) = &config.monitoring.prometheus_listen {
        monitoring::init_exporter(listen)?;
    }

    match cli.command {
        Command::Dao(cmd) => run_dao(&config, cmd).await,
        Command::Hub(cmd) => run_hub(&config, cmd).await,
        Command::Explore => run_explore(&config).await,
        Command::Init(cmd) => init_config_file(cmd),
    }
}

fn init_tracing(config: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().build()?)
}

fn graph_transport(config: &AppConfig) -> Result<Arc<dyn GraphTransport>> {
    let client = http_client()?;
    Ok(Arc::new(GraphClient::new(
        client,
        config.engine.request_timeout_ms,
    )))
}

async fn run_dao(config: &AppConfig, cmd: DaoCmd) -> Result<()> {
    let transport = graph_transport(config)?;
    let aggregator = DaoAggregator::new(
        transport,
        config.chains.clone(),
        config.registry.clone(),
    );

    let args = DaoQueryArgs {
        chain_id: cmd.chain,
        dao_address: cmd.address.to_lowercase(),
        member_address: cmd.member.map(|m| m.to_lowercase()),
        minion_id: cmd.minion,
    };

    let overview = StateCell::new(Value::Null);
    let activities = StateCell::new(Value::Null);
    let members = StateCell::new(Value::Null);
    let balances = StateCell::new(Value::Null);
    let minions = StateCell::new(Value::Null);
    let uberhaus = StateCell::new(Value::Null);

    let mut tasks = vec![
        AggregatorTask::Overview(Arc::new(overview.clone())),
        AggregatorTask::Activities(ActivityConsumers {
            activities: Some(Arc::new(activities.clone())),
            ..ActivityConsumers::default()
        }),
        AggregatorTask::Members(Arc::new(members.clone())),
        AggregatorTask::BankBalances(Arc::new(balances.clone())),
        AggregatorTask::UberMinions(Arc::new(minions.clone())),
    ];
    if args.member_address.is_some() {
        tasks.push(AggregatorTask::UberHausData(Arc::new(uberhaus.clone())));
    }

    let results = aggregator.dispatch(&args, tasks).await;

    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    if failed > 0 {
        warn!(target: "daograph", failed, "some aggregators failed; sections may be empty");
    }

    let summary = json!({
        "overview": overview.snapshot(),
        "activities": activities.snapshot(),
        "members": members.snapshot(),
        "balances": balances.snapshot(),
        "minions": minions.snapshot(),
        "uberhaus": uberhaus.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_hub(config: &AppConfig, cmd: HubCmd) -> Result<()> {
    let transport = graph_transport(config)?;
    let orchestrator = CrossChainOrchestrator::new(transport, config.chains.clone());
    let meta_fetcher = HttpMetaFetcher::new(
        http_client()?,
        config.api.metadata_url.clone(),
        config.engine.request_timeout_ms,
    );

    let sink: StateCell<Vec<ChainRecords>> = StateCell::default();
    orchestrator
        .hub_query(
            &cmd.member.to_lowercase(),
            &meta_fetcher,
            Arc::new(sink.clone()),
            None,
        )
        .await?;

    let mut result = sink.snapshot();
    result.sort_by_key(|records| records.chain.hub_sort_order);
    info!(target: "daograph", chains = result.len(), "hub aggregation complete");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_explore(config: &AppConfig) -> Result<()> {
    let transport = graph_transport(config)?;
    let orchestrator = CrossChainOrchestrator::new(transport, config.chains.clone());
    let client = http_client()?;
    let meta_fetcher = HttpMetaFetcher::new(
        client.clone(),
        config.api.metadata_url.clone(),
        config.engine.request_timeout_ms,
    );
    let price_source = HttpPriceSource::new(
        client,
        config.api.prices_url.clone(),
        config.engine.request_timeout_ms,
    );

    let sink: StateCell<ExploreState> = StateCell::default();
    orchestrator
        .explore_query(&meta_fetcher, &price_source, Arc::new(sink.clone()))
        .await?;

    let state = sink.snapshot();
    info!(
        target: "daograph",
        chains = state.chains.len(),
        organizations = state.data.len(),
        "explore aggregation complete"
    );
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn init_config_file(cmd: InitCmd) -> Result<()> {
    let path = cmd
        .path
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATHS[0]));
    if path.exists() && !cmd.force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    info!(target: "daograph", path = %path.display(), "config template written");
    Ok(())
}
