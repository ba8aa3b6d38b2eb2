//! Fan-out of one mutation to every registered target.
//!
//! Replication is synchronous and best-effort: every target is attempted in
//! registry order, failures are neither retried nor rolled back, and the
//! wire reply never reflects them. What did happen is returned as a
//! [`ReplicationReport`] and accumulated in [`ReplicationStats`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use writethru_storage::{AtomStore, StorageError, StorageTarget};

use super::registry::RegisteredTarget;

/// Result of one target call.
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-target results of one fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationReport {
    pub operation: &'static str,
    pub outcomes: Vec<TargetOutcome>,
}

impl ReplicationReport {
    /// Number of targets that were attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// The wire reply of a command plus what replication did, if it ran.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub reply: String,
    pub report: Option<ReplicationReport>,
}

/// Running totals across all fan-outs.
#[derive(Debug, Default)]
pub struct ReplicationStats {
    fan_outs: AtomicU64,
    target_calls: AtomicU64,
    target_failures: AtomicU64,
}

/// Point-in-time copy of [`ReplicationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub fan_outs: u64,
    pub target_calls: u64,
    pub target_failures: u64,
}

impl ReplicationStats {
    pub fn record(&self, report: &ReplicationReport) {
        self.fan_outs.fetch_add(1, Ordering::Relaxed);
        self.target_calls
            .fetch_add(report.attempted() as u64, Ordering::Relaxed);
        self.target_failures
            .fetch_add(report.failures().count() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fan_outs: self.fan_outs.load(Ordering::Relaxed),
            target_calls: self.target_calls.load(Ordering::Relaxed),
            target_failures: self.target_failures.load(Ordering::Relaxed),
        }
    }
}

/// Applies `op` to each target in order and collects the outcomes.
pub fn fan_out(
    operation: &'static str,
    targets: &[RegisteredTarget],
    store: &AtomStore,
    op: impl Fn(&dyn StorageTarget, &AtomStore) -> Result<(), StorageError>,
) -> ReplicationReport {
    let outcomes = targets
        .iter()
        .map(|registered| {
            let target = registered.target.as_ref();
            let error = match op(target, store) {
                Ok(()) => None,
                Err(err) => {
                    tracing::warn!("{} to {} failed: {}", operation, target.describe(), err);
                    Some(err.to_string())
                }
            };
            TargetOutcome {
                target: target.describe(),
                error,
            }
        })
        .collect();

    tracing::debug!("{} replicated to {} target(s)", operation, targets.len());
    ReplicationReport {
        operation,
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use writethru_core::{EntitySpec, EntityType};
    use writethru_storage::MemoryTarget;

    fn registered(store: &mut AtomStore, name: &str) -> (RegisteredTarget, Arc<MemoryTarget>) {
        let target = Arc::new(MemoryTarget::new(name));
        let node = store.attach_target(name, target.clone()).unwrap();
        (RegisteredTarget { node, target: target.clone() }, target)
    }

    #[test]
    fn failures_do_not_stop_the_fan_out() {
        let mut store = AtomStore::new();
        let (r1, t1) = registered(&mut store, "t1");
        let (r2, t2) = registered(&mut store, "t2");
        let (r3, t3) = registered(&mut store, "t3");
        t2.set_connected(false);
        let cat = store
            .add(&EntitySpec::node(EntityType::ConceptNode, "cat"))
            .unwrap();

        let report = fan_out("store_entity", &[r1, r2, r3], &store, |target, store| {
            target.store_entity(store, cat)
        });

        assert_eq!(report.attempted(), 3);
        assert!(!report.all_succeeded());
        let failed: Vec<&str> = report.failures().map(|o| o.target.as_str()).collect();
        assert_eq!(failed, vec!["MemoryTarget(t2)"]);
        assert!(t1.contains(cat));
        assert!(t3.contains(cat));
    }

    #[test]
    fn stats_accumulate() {
        let stats = ReplicationStats::default();
        stats.record(&ReplicationReport {
            operation: "store_value",
            outcomes: vec![
                TargetOutcome { target: "a".into(), error: None },
                TargetOutcome { target: "b".into(), error: Some("down".into()) },
            ],
        });
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                fan_outs: 1,
                target_calls: 2,
                target_failures: 1
            }
        );
    }
}
