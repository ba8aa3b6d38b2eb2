//! Schema types for session management and command evaluation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response after opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    /// The assigned session UUID.
    pub session_id: Uuid,
    /// Commands routed through the proxy, sorted. Empty on a read-only store.
    pub handlers: Vec<String>,
}

/// Response listing open sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<Uuid>,
}

/// Request to evaluate one command in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    /// Wire command name, e.g. `value-set`.
    pub command: String,
    /// The command's JSON argument, as text.
    pub arg: String,
}

/// The wire reply of an evaluated command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResponse {
    pub reply: String,
}
