//! Schema types for attaching backend targets.

use serde::{Deserialize, Serialize};

use crate::config::TargetConfig;

/// Backend kind for a new target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Memory,
    Sqlite,
}

/// Request to attach a target to the store.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachTargetRequest {
    /// `StorageNode` name for a memory target.
    pub name: Option<String>,
    pub kind: TargetKind,
    /// Database path for a sqlite target.
    pub path: Option<String>,
}

impl AttachTargetRequest {
    /// Converts the request into a target config, or explains what is missing.
    pub fn into_config(self) -> Result<TargetConfig, String> {
        match self.kind {
            TargetKind::Memory => self
                .name
                .filter(|name| !name.is_empty())
                .map(|name| TargetConfig::Memory { name })
                .ok_or_else(|| "memory target requires a name".to_string()),
            TargetKind::Sqlite => self
                .path
                .filter(|path| !path.is_empty())
                .map(|path| TargetConfig::Sqlite { path })
                .ok_or_else(|| "sqlite target requires a path".to_string()),
        }
    }
}

/// Response after attaching a target.
#[derive(Debug, Clone, Serialize)]
pub struct AttachTargetResponse {
    pub success: bool,
    /// The name the target's `StorageNode` was created with.
    pub name: String,
    /// Always false: the proxy picks the target up on the next `/proxy/init`.
    pub registered: bool,
}
