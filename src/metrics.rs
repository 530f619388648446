//! Prometheus metrics: a small set of counters/histograms for blocks
//! written, reorgs detected/applied, reorg depth, and bootstrap throughput,
//! scraped by an external system (out of scope to describe further).

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::config::MetricsSettings;
use crate::error::{InfraError, Result};

/// Counter: total blocks persisted by the Block Writer, across bootstrap
/// and live ingress.
pub const BLOCKS_WRITTEN_TOTAL: &str = "chain_indexer_blocks_written_total";
/// Counter: reorgs detected (created), across both detection paths.
pub const REORGS_DETECTED_TOTAL: &str = "chain_indexer_reorgs_detected_total";
/// Counter: reorgs successfully applied by the Reorg Applier.
pub const REORGS_APPLIED_TOTAL: &str = "chain_indexer_reorgs_applied_total";
/// Histogram: depth (in blocks) of each applied reorg.
pub const REORG_DEPTH_BLOCKS: &str = "chain_indexer_reorg_depth_blocks";
/// Histogram: wall-clock duration of a bootstrap run, in seconds.
pub const BOOTSTRAP_DURATION_SECONDS: &str = "chain_indexer_bootstrap_duration_seconds";

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Installs a no-op recorder (metrics calls become cheap discards) when
/// `settings.enabled` is `false`, so instrumented code never needs to branch
/// on whether metrics are turned on.
///
/// # Errors
/// Returns [`InfraError::Internal`] if the exporter cannot bind its socket.
pub fn install(settings: &MetricsSettings) -> Result<()> {
    if !settings.enabled {
        return Ok(());
    }

    let addr: std::net::SocketAddr =
        settings.socket_addr().parse().map_err(|e| InfraError::Internal(format!("invalid metrics address: {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| InfraError::Internal(format!("failed to install Prometheus exporter: {e}")))?;

    describe();
    info!(address = %addr, "metrics exporter listening");
    Ok(())
}

fn describe() {
    metrics::describe_counter!(BLOCKS_WRITTEN_TOTAL, "Total blocks persisted by the Block Writer");
    metrics::describe_counter!(REORGS_DETECTED_TOTAL, "Total reorgs detected");
    metrics::describe_counter!(REORGS_APPLIED_TOTAL, "Total reorgs successfully applied");
    metrics::describe_histogram!(REORG_DEPTH_BLOCKS, metrics::Unit::Count, "Depth in blocks of each applied reorg");
    metrics::describe_histogram!(BOOTSTRAP_DURATION_SECONDS, metrics::Unit::Seconds, "Wall-clock duration of a bootstrap run");
}

/// Record one block written.
pub fn record_block_written() {
    metrics::counter!(BLOCKS_WRITTEN_TOTAL).increment(1);
}

/// Record one reorg detected.
pub fn record_reorg_detected() {
    metrics::counter!(REORGS_DETECTED_TOTAL).increment(1);
}

/// Record one reorg applied, with its depth in blocks.
pub fn record_reorg_applied(depth_blocks: u64) {
    metrics::counter!(REORGS_APPLIED_TOTAL).increment(1);
    metrics::histogram!(REORG_DEPTH_BLOCKS).record(depth_blocks as f64);
}

/// Record a completed bootstrap run's duration.
pub fn record_bootstrap_duration(duration: std::time::Duration) {
    metrics::histogram!(BOOTSTRAP_DURATION_SECONDS).record(duration.as_secs_f64());
}
