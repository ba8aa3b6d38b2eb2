//! The set of backend targets writes are replicated to.
//!
//! [`TargetRegistry`] is rebuilt from the store on initialization and only
//! read afterwards. Readers take an `Arc` snapshot, so a rebuild never
//! changes a list that a fan-out is iterating.

use std::sync::{Arc, RwLock};

use writethru_core::EntityId;
use writethru_storage::{AtomStore, StorageTarget};

/// A target retained by the registry, with the `StorageNode` it is bound to.
#[derive(Clone)]
pub struct RegisteredTarget {
    pub node: EntityId,
    pub target: Arc<dyn StorageTarget>,
}

/// Ordered, connected-at-initialization backend targets.
///
/// Membership is not re-checked per write: a target that disconnects after
/// registration is still addressed, and its failures show up in the
/// replication report.
pub struct TargetRegistry {
    targets: RwLock<Arc<Vec<RegisteredTarget>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        TargetRegistry {
            targets: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replaces the registry with every connected target known to `store`,
    /// in attachment order. Returns the new size.
    pub fn rebuild(&self, store: &AtomStore) -> usize {
        let mut retained = Vec::new();
        for (node, target) in store.enumerate_targets() {
            if target.connected() {
                tracing::info!("write-through to {}", target.describe());
                retained.push(RegisteredTarget { node, target });
            } else {
                tracing::debug!("skipping disconnected target {}", target.describe());
            }
        }

        if retained.is_empty() {
            tracing::info!("no connected targets; writes stay local");
        }

        let count = retained.len();
        *self.targets.write().unwrap() = Arc::new(retained);
        count
    }

    /// The current membership. Stable for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<Vec<RegisteredTarget>> {
        Arc::clone(&self.targets.read().unwrap())
    }

    pub fn len(&self) -> usize {
        self.targets.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Target descriptions, in registry order.
    pub fn describe(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|registered| registered.target.describe())
            .collect()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use writethru_storage::MemoryTarget;

    fn attach(store: &mut AtomStore, name: &str, connected: bool) -> Arc<MemoryTarget> {
        let target = Arc::new(MemoryTarget::new(name));
        target.set_connected(connected);
        store.attach_target(name, target.clone()).unwrap();
        target
    }

    #[test]
    fn keeps_only_connected_targets_in_order() {
        let mut store = AtomStore::new();
        attach(&mut store, "t1", true);
        attach(&mut store, "t2", false);
        attach(&mut store, "t3", true);

        let registry = TargetRegistry::new();
        assert_eq!(registry.rebuild(&store), 2);
        assert_eq!(
            registry.describe(),
            vec!["MemoryTarget(t1)".to_string(), "MemoryTarget(t3)".to_string()]
        );
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = TargetRegistry::new();
        assert_eq!(registry.rebuild(&AtomStore::new()), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_membership() {
        let mut store = AtomStore::new();
        let t1 = attach(&mut store, "t1", true);
        let registry = TargetRegistry::new();
        registry.rebuild(&store);

        t1.set_connected(false);
        attach(&mut store, "t2", true);
        registry.rebuild(&store);
        assert_eq!(registry.describe(), vec!["MemoryTarget(t2)".to_string()]);
    }

    #[test]
    fn snapshot_survives_rebuild() {
        let mut store = AtomStore::new();
        attach(&mut store, "t1", true);
        let registry = TargetRegistry::new();
        registry.rebuild(&store);

        let held = registry.snapshot();
        registry.rebuild(&AtomStore::new());
        assert_eq!(held.len(), 1);
        assert!(registry.is_empty());
    }
}
