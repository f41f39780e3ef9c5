use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

static DAOGRAPH_EXPORTER: OnceCell<()> = OnceCell::new();
static EXPORTER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs the Prometheus scrape endpoint for indexer query metrics.
/// Safe to call more than once; only the first call installs anything.
pub fn init_exporter(listen: &str) -> Result<()> {
    DAOGRAPH_EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid metrics listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install the metrics exporter")?;
            describe_counter!(
                "daograph_query_total",
                "Indexer queries issued, labeled by outcome and HTTP status"
            );
            describe_histogram!(
                "daograph_query_latency_ms",
                "End-to-end indexer query latency in milliseconds"
            );
            EXPORTER_INSTALLED.store(true, Ordering::Relaxed);
            Ok(())
        })
        .map(|_| ())
}

/// Whether [`init_exporter`] has successfully run. Recorders skip metric
/// emission entirely when no exporter is listening.
pub fn exporter_installed() -> bool {
    EXPORTER_INSTALLED.load(Ordering::Relaxed)
}
