//! Proxies: modules that sit between a session's evaluator and the store.
//!
//! - [`registry::TargetRegistry`] for the set of connected backend targets
//! - [`annotation::AnnotationKeyCache`] for the reserved annotation key
//! - [`replicate`] for fan-out and its per-target results
//! - [`writethru::WriteThruProxy`] for write-through replication

pub mod annotation;
pub mod registry;
pub mod replicate;
pub mod writethru;

pub use annotation::AnnotationKeyCache;
pub use registry::{RegisteredTarget, TargetRegistry};
pub use replicate::{CommandOutcome, ReplicationReport, ReplicationStats, StatsSnapshot, TargetOutcome};
pub use writethru::WriteThruProxy;

use std::sync::Arc;

use crate::eval::Evaluator;

/// Lifecycle hooks a host calls on a loaded proxy.
pub trait Proxy: Send + Sync {
    /// (Re)builds any state derived from the store.
    fn init(&self);

    /// Installs command handlers into a session's evaluator.
    fn setup(self: Arc<Self>, evaluator: &mut Evaluator);

    /// Offers configuration text. Returns whether it was accepted.
    fn config(&self, text: &str) -> bool;
}
