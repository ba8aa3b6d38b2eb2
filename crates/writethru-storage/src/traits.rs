//! The [`StorageTarget`] trait defining the replication contract for
//! backend stores.
//!
//! A target receives writes that have already been applied to the local
//! [`AtomStore`]. Value writes name only the (entity, key) pair; the target
//! re-reads the current value from the store it is handed. All backends
//! (MemoryTarget, SqliteTarget, etc.) implement this trait, so they are
//! fully swappable behind the replication layer.

use writethru_core::{EntityId, Value};

use crate::error::StorageError;
use crate::store::AtomStore;

/// A backend store that accepts replicated entity/value writes.
///
/// Methods take `&self`: targets are shared by every session and guard
/// their own state. A target that is not connected must fail writes with
/// [`StorageError::Disconnected`].
pub trait StorageTarget: Send + Sync {
    /// Short human-readable description for logs and status listings.
    fn describe(&self) -> String;

    /// Whether the target is currently open for writes.
    fn connected(&self) -> bool;

    /// Stores the current value of `key` on `entity`, as found in `store`.
    ///
    /// The entity (and its outgoing members) is stored too if the target
    /// does not hold it yet. A key with no value in `store` is cleared.
    fn store_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
    ) -> Result<(), StorageError>;

    /// Stores `entity`, its outgoing members, and every value attached to it.
    fn store_entity(&self, store: &AtomStore, entity: EntityId) -> Result<(), StorageError>;

    /// Merges `delta` into the target's own copy of the value at `key`.
    fn update_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
        delta: &Value,
    ) -> Result<(), StorageError>;

    /// Removes `entity` from the target.
    ///
    /// Returns `Ok(false)` if the target does not hold the entity, or if it
    /// has dependents and `recursive` is false.
    fn remove_entity(&self, entity: EntityId, recursive: bool) -> Result<bool, StorageError>;
}
