//! Schema types for the proxy lifecycle endpoints.

use serde::{Deserialize, Serialize};

use crate::proxy::StatsSnapshot;

/// One registry member.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    /// The target's `StorageNode` id, full hex.
    pub node: String,
    /// The target's own description, e.g. `MemoryTarget(mirror)`.
    pub target: String,
    /// Whether the target reports connected right now.
    pub connected: bool,
}

/// Current registry contents, in replication order.
#[derive(Debug, Clone, Serialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetView>,
}

/// Proxy status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub read_only: bool,
    pub registered_targets: usize,
    /// Full hex id of the annotation key, once it has been created.
    pub annotation_key: Option<String>,
    pub stats: StatsSnapshot,
    pub sessions: usize,
}

/// Request to pass configuration text to the proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRequest {
    pub text: String,
}

/// Whether the proxy accepted the configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub accepted: bool,
}
