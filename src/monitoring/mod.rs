mod latency;
mod metrics;

pub use latency::{LatencyGuard, LatencyMetadata, guard_with_level};
pub use metrics::{exporter_installed, init_exporter};
