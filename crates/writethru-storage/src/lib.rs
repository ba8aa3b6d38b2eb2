//! Graph store and replication targets for writethru.
//!
//! Provides the authoritative in-memory [`AtomStore`], the
//! [`StorageTarget`] trait that every backend implements, and two
//! first-class backends: [`MemoryTarget`] and [`SqliteTarget`].
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`store`]: AtomStore, the local graph store
//! - [`traits`]: StorageTarget trait definition
//! - [`memory`]: MemoryTarget implementation
//! - [`schema`]: SQL schema migrations for the SQLite backend
//! - [`sqlite`]: SqliteTarget implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::{MemoryTarget, TargetCall};
pub use sqlite::SqliteTarget;
pub use store::{AtomStore, SharedStore};
pub use traits::StorageTarget;
