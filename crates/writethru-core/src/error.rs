//! Core error types for writethru-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the failure modes of the entity and value data model.

use thiserror::Error;

use crate::entity::EntityType;

/// Core errors produced by the writethru-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity description does not match its type (node without a name,
    /// link without an outgoing set, and so on).
    #[error("invalid entity of type {kind}: {reason}")]
    InvalidEntity { kind: EntityType, reason: String },

    /// A hex string could not be parsed as an entity id.
    #[error("invalid entity id '{input}'")]
    InvalidEntityId { input: String },
}
