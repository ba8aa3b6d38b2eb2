//! Storage error types for writethru-storage.
//!
//! [`StorageError`] covers the local store (read-only, malformed entities)
//! and the backends (disconnection, SQLite, serialization, migrations).

use thiserror::Error;

use writethru_core::{CoreError, EntityId};

/// Errors produced by the store and by storage targets.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// The entity description was malformed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store rejects all mutations.
    #[error("store is read-only")]
    ReadOnly,

    /// An entity was not found.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A target was written to while not connected.
    #[error("target {target} is not connected")]
    Disconnected { target: String },

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
