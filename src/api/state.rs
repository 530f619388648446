//! Shared application state injected into every HTTP handler.

use std::sync::Arc;

use crate::config::IngestionSettings;
use crate::indexer::Supervisor;
use crate::ports::{EventPublisher, NodeClient, Store};
use crate::store::BlockCache;

/// Everything a handler needs to drive the ingestion core.
///
/// This system binds one upstream node per deployment (§1's non-goal: "does
/// not resolve conflicts between multiple nodes; each blockchain binds to
/// exactly one node"), so `node_client`/`node_slug` are shared across every
/// blockchain the store knows about.
#[derive(Clone)]
pub struct AppState {
    /// The persistence port.
    pub store: Arc<dyn Store>,
    /// The per-node block prefetch cache.
    pub cache: Arc<BlockCache>,
    /// The upstream node client.
    pub node_client: Arc<dyn NodeClient>,
    /// The node's cache key / log field.
    pub node_slug: Arc<str>,
    /// The per-blockchain job supervisor.
    pub supervisor: Arc<Supervisor>,
    /// Outbound event publisher.
    pub publisher: Arc<dyn EventPublisher>,
    /// Ingestion tuning knobs (reorg thresholds, progress reporting cadence).
    pub ingestion_settings: Arc<IngestionSettings>,
}
