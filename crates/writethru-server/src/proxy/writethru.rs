//! Write-through proxy: apply locally, then replicate to every target.
//!
//! [`WriteThruProxy`] installs handlers for the six mutation commands. Each
//! handler lets the [`Decoder`] apply the mutation to the local store and
//! then, from the decoder's callback, fans the change out to the targets in
//! the [`TargetRegistry`]. Deletion is local-first: targets are contacted
//! only after the local store confirmed the removal.

use std::sync::Arc;

use writethru_core::{EntityId, Value};
use writethru_storage::{AtomStore, SharedStore, StorageError, StorageTarget};

use super::annotation::AnnotationKeyCache;
use super::registry::TargetRegistry;
use super::replicate::{fan_out, CommandOutcome, ReplicationReport, ReplicationStats, StatsSnapshot};
use super::Proxy;
use crate::decoder::{error_reply, Decoder, FALSE_REPLY, TRUE_REPLY};
use crate::eval::{
    Evaluator, Handler, ANNOTATION_SET, ENTITY_DELETE, ENTITY_DELETE_RECURSIVE, VALUES_SET,
    VALUE_SET, VALUE_UPDATE,
};

/// Replicates every mutation to all connected backend targets.
pub struct WriteThruProxy {
    store: SharedStore,
    decoder: Arc<Decoder>,
    registry: TargetRegistry,
    annotation_key: AnnotationKeyCache,
    stats: ReplicationStats,
}

impl WriteThruProxy {
    pub fn new(store: SharedStore) -> Self {
        WriteThruProxy {
            decoder: Arc::new(Decoder::new(Arc::clone(&store))),
            store,
            registry: TargetRegistry::new(),
            annotation_key: AnnotationKeyCache::new(),
            stats: ReplicationStats::default(),
        }
    }

    /// The decoder this proxy applies commands with.
    pub fn decoder(&self) -> Arc<Decoder> {
        Arc::clone(&self.decoder)
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The annotation key, if any annotation has been replicated yet.
    pub fn annotation_key(&self) -> Option<EntityId> {
        self.annotation_key.cached()
    }

    /// How many times the annotation key entity was created (0 or 1).
    pub fn annotation_key_creations(&self) -> usize {
        self.annotation_key.creations()
    }

    /// Rebuilds the target registry from the store. Returns its new size.
    pub fn initialize(&self) -> usize {
        let store = self.store.read().unwrap();
        self.registry.rebuild(&store)
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// `entity-delete` / `entity-delete-recursive`.
    ///
    /// A missing entity is a successful no-op. A refused local delete
    /// replies `#f` and contacts no target.
    pub fn extract(&self, arg: &str, recursive: bool) -> CommandOutcome {
        let id = match self.decoder.delete(arg, recursive) {
            Ok(Some((id, true))) => id,
            Ok(None) => return reply_only(TRUE_REPLY.to_string()),
            Ok(Some((_, false))) => return reply_only(FALSE_REPLY.to_string()),
            Err(err) => return reply_only(error_reply(&err)),
        };

        let report = self.replicate("remove_entity", |target, _| {
            target.remove_entity(id, recursive).map(|_| ())
        });
        CommandOutcome {
            reply: TRUE_REPLY.to_string(),
            report: Some(report),
        }
    }

    /// `value-set`: each target stores the (entity, key) pair, re-reading the
    /// value from the store.
    pub fn set_value(&self, arg: &str) -> CommandOutcome {
        let mut report = None;
        let reply = self.decoder.set_value(arg, |entity, key, _value| {
            report = Some(self.replicate("store_value", |target, store| {
                target.store_value(store, entity, key)
            }));
        });
        CommandOutcome { reply, report }
    }

    /// `values-set`: each target stores the whole entity, not just the keys
    /// that were sent.
    pub fn set_values(&self, arg: &str) -> CommandOutcome {
        let mut report = None;
        let reply = self.decoder.set_values(arg, |entity| {
            report = Some(self.replicate("store_entity", |target, store| {
                target.store_entity(store, entity)
            }));
        });
        CommandOutcome { reply, report }
    }

    /// `annotation-set`: like `value-set`, pinned to the annotation key.
    pub fn set_annotation(&self, arg: &str) -> CommandOutcome {
        let mut report = None;
        let reply = self.decoder.set_annotation(arg, |entity, _annotation| {
            report = self.replicate_annotation(entity);
        });
        CommandOutcome { reply, report }
    }

    fn replicate_annotation(&self, entity: EntityId) -> Option<ReplicationReport> {
        let key = match self.annotation_key.get_or_create(&self.store) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("cannot create annotation key, not replicating: {}", err);
                return None;
            }
        };
        Some(self.replicate("store_value", |target, store| {
            target.store_value(store, entity, key)
        }))
    }

    /// `value-update`: each target merges the delta itself.
    pub fn update_value(&self, arg: &str) -> CommandOutcome {
        let mut report = None;
        let reply = self.decoder.update_value(arg, |entity, key, delta: &Value| {
            report = Some(self.replicate("update_value", |target, store| {
                target.update_value(store, entity, key, delta)
            }));
        });
        CommandOutcome { reply, report }
    }

    fn replicate(
        &self,
        operation: &'static str,
        op: impl Fn(&dyn StorageTarget, &AtomStore) -> Result<(), StorageError>,
    ) -> ReplicationReport {
        let targets = self.registry.snapshot();
        let store = self.store.read().unwrap();
        let report = fan_out(operation, &targets, &store, op);
        self.stats.record(&report);
        report
    }

    fn handler(self: &Arc<Self>, command: fn(&WriteThruProxy, &str) -> CommandOutcome) -> Handler {
        let proxy = Arc::clone(self);
        Arc::new(move |arg: &str| command(&proxy, arg).reply)
    }
}

fn reply_only(reply: String) -> CommandOutcome {
    CommandOutcome {
        reply,
        report: None,
    }
}

impl Proxy for WriteThruProxy {
    fn init(&self) {
        self.initialize();
    }

    fn setup(self: Arc<Self>, evaluator: &mut Evaluator) {
        if self.store.read().unwrap().is_read_only() {
            tracing::info!("read-only store; write-through proxying disabled");
            return;
        }

        evaluator.install_handler(ENTITY_DELETE, self.handler(|p, arg| p.extract(arg, false)));
        evaluator.install_handler(
            ENTITY_DELETE_RECURSIVE,
            self.handler(|p, arg| p.extract(arg, true)),
        );
        evaluator.install_handler(VALUE_SET, self.handler(WriteThruProxy::set_value));
        evaluator.install_handler(VALUES_SET, self.handler(WriteThruProxy::set_values));
        evaluator.install_handler(ANNOTATION_SET, self.handler(WriteThruProxy::set_annotation));
        evaluator.install_handler(VALUE_UPDATE, self.handler(WriteThruProxy::update_value));
    }

    fn config(&self, text: &str) -> bool {
        tracing::debug!("write-through proxy does not take configuration: {:?}", text);
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::decoder::{
        KeyValueArg, SetAnnotationArg, SetValueArg, SetValuesArg, UpdateValueArg, UNIT_REPLY,
    };
    use crate::eval::MUTATION_COMMANDS;
    use writethru_core::{Annotation, EntitySpec, EntityType};
    use writethru_storage::{MemoryTarget, TargetCall};

    struct Fixture {
        proxy: Arc<WriteThruProxy>,
        targets: Vec<Arc<MemoryTarget>>,
    }

    /// Attaches one memory target per flag (connected or not), then
    /// initializes the proxy.
    fn fixture(connected: &[bool]) -> Fixture {
        let mut store = AtomStore::new();
        let targets: Vec<Arc<MemoryTarget>> = connected
            .iter()
            .enumerate()
            .map(|(i, up)| {
                let target = Arc::new(MemoryTarget::new(format!("t{}", i + 1)));
                target.set_connected(*up);
                store
                    .attach_target(&format!("t{}", i + 1), target.clone())
                    .unwrap();
                target
            })
            .collect();
        let proxy = Arc::new(WriteThruProxy::new(Arc::new(RwLock::new(store))));
        proxy.init();
        Fixture { proxy, targets }
    }

    fn concept(name: &str) -> EntitySpec {
        EntitySpec::node(EntityType::ConceptNode, name)
    }

    fn predicate(name: &str) -> EntitySpec {
        EntitySpec::node(EntityType::PredicateNode, name)
    }

    fn value_set_arg(entity: &str, key: &str, value: f64) -> String {
        serde_json::to_string(&SetValueArg {
            entity: concept(entity),
            key: predicate(key),
            value: Some(Value::floats(vec![value])),
        })
        .unwrap()
    }

    fn annotation_arg(entity: &str) -> String {
        serde_json::to_string(&SetAnnotationArg {
            entity: concept(entity),
            annotation: Annotation {
                strength: 0.8,
                confidence: 0.9,
            },
        })
        .unwrap()
    }

    #[test]
    fn value_set_reaches_connected_targets_only() {
        let fx = fixture(&[true, false, true]);
        let outcome = fx.proxy.set_value(&value_set_arg("E", "K", 1.0));

        assert_eq!(outcome.reply, UNIT_REPLY);
        let entity = concept("E").id().unwrap();
        let key = predicate("K").id().unwrap();
        let expected = vec![TargetCall::StoreValue { entity, key }];
        assert_eq!(fx.targets[0].calls(), expected);
        assert!(fx.targets[1].calls().is_empty());
        assert_eq!(fx.targets[2].calls(), expected);
        assert_eq!(outcome.report.unwrap().attempted(), 2);
    }

    #[test]
    fn target_connecting_later_is_still_excluded() {
        let fx = fixture(&[false]);
        fx.targets[0].set_connected(true);
        fx.proxy.set_value(&value_set_arg("E", "K", 1.0));
        assert!(fx.targets[0].calls().is_empty());

        fx.proxy.init();
        fx.proxy.set_value(&value_set_arg("E", "K", 2.0));
        assert_eq!(fx.targets[0].calls().len(), 1);
    }

    #[test]
    fn target_disconnecting_later_is_still_addressed() {
        let fx = fixture(&[true, true]);
        fx.targets[0].set_connected(false);

        let outcome = fx.proxy.set_value(&value_set_arg("E", "K", 1.0));
        assert_eq!(outcome.reply, UNIT_REPLY);
        let report = outcome.report.unwrap();
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(fx.targets[0].calls().len(), 1);
        assert_eq!(fx.proxy.stats().target_failures, 1);
    }

    #[test]
    fn values_set_stores_whole_entity() {
        let fx = fixture(&[true]);
        fx.proxy.set_value(&value_set_arg("E", "old", 1.0));
        let arg = serde_json::to_string(&SetValuesArg {
            entity: concept("E"),
            values: vec![KeyValueArg {
                key: predicate("new"),
                value: Value::floats(vec![2.0]),
            }],
        })
        .unwrap();

        fx.proxy.set_values(&arg);
        let entity = concept("E").id().unwrap();
        assert_eq!(
            fx.targets[0].calls().last(),
            Some(&TargetCall::StoreEntity { entity })
        );
        // The key that was not part of the command is replicated too.
        let old = predicate("old").id().unwrap();
        assert_eq!(fx.targets[0].get_value(entity, old), Some(Value::floats(vec![1.0])));
    }

    #[test]
    fn annotation_key_is_created_once() {
        let fx = fixture(&[true]);
        assert_eq!(fx.proxy.annotation_key(), None);

        fx.proxy.set_annotation(&annotation_arg("A"));
        fx.proxy.set_annotation(&annotation_arg("B"));

        let key = fx.proxy.annotation_key().unwrap();
        assert_eq!(fx.proxy.annotation_key_creations(), 1);
        let entity = concept("B").id().unwrap();
        assert_eq!(
            fx.targets[0].calls().last(),
            Some(&TargetCall::StoreValue { entity, key })
        );
        assert!(matches!(
            fx.targets[0].get_value(entity, key),
            Some(Value::Annotation(_))
        ));
    }

    #[test]
    fn value_update_forwards_delta() {
        let fx = fixture(&[true]);
        let arg = serde_json::to_string(&UpdateValueArg {
            entity: concept("E"),
            key: predicate("count"),
            delta: Value::floats(vec![1.0]),
        })
        .unwrap();

        fx.proxy.update_value(&arg);
        fx.proxy.update_value(&arg);

        let entity = concept("E").id().unwrap();
        let key = predicate("count").id().unwrap();
        assert_eq!(
            fx.targets[0].calls().last(),
            Some(&TargetCall::UpdateValue {
                entity,
                key,
                delta: Value::floats(vec![1.0])
            })
        );
        assert_eq!(fx.targets[0].get_value(entity, key), Some(Value::floats(vec![2.0])));
    }

    #[test]
    fn deleting_missing_entity_contacts_no_target() {
        let fx = fixture(&[true, true]);
        let arg = serde_json::to_string(&concept("ghost")).unwrap();

        let outcome = fx.proxy.extract(&arg, false);
        assert_eq!(outcome.reply, TRUE_REPLY);
        assert!(outcome.report.is_none());
        assert!(fx.targets.iter().all(|t| t.calls().is_empty()));
    }

    #[test]
    fn refused_local_delete_contacts_no_target() {
        let fx = fixture(&[true]);
        fx.proxy
            .decoder()
            .store()
            .write()
            .unwrap()
            .add(&EntitySpec::link(EntityType::ListLink, vec![concept("a")]))
            .unwrap();
        let arg = serde_json::to_string(&concept("a")).unwrap();

        let outcome = fx.proxy.extract(&arg, false);
        assert_eq!(outcome.reply, FALSE_REPLY);
        assert!(fx.targets[0].calls().is_empty());
    }

    #[test]
    fn confirmed_delete_propagates_flag() {
        let fx = fixture(&[true]);
        fx.proxy.set_value(&value_set_arg("a", "K", 1.0));
        let arg = serde_json::to_string(&concept("a")).unwrap();

        let outcome = fx.proxy.extract(&arg, true);
        assert_eq!(outcome.reply, TRUE_REPLY);
        let entity = concept("a").id().unwrap();
        assert_eq!(
            fx.targets[0].calls().last(),
            Some(&TargetCall::RemoveEntity {
                entity,
                recursive: true
            })
        );
        assert!(!fx.targets[0].contains(entity));
    }

    #[test]
    fn setup_installs_all_six_handlers() {
        let fx = fixture(&[]);
        let mut eval = Evaluator::new(fx.proxy.decoder());
        Arc::clone(&fx.proxy).setup(&mut eval);
        for command in MUTATION_COMMANDS {
            assert!(eval.is_installed(command), "{command} not installed");
        }
    }

    #[test]
    fn read_only_store_installs_nothing() {
        let fx = fixture(&[true]);
        fx.proxy.decoder().store().write().unwrap().set_read_only(true);
        let mut eval = Evaluator::new(fx.proxy.decoder());
        Arc::clone(&fx.proxy).setup(&mut eval);

        assert!(eval.installed().is_empty());
        eval.eval(VALUE_SET, &value_set_arg("E", "K", 1.0)).unwrap();
        assert!(fx.targets[0].calls().is_empty());
    }

    #[test]
    fn installed_handler_replicates() {
        let fx = fixture(&[true]);
        let mut eval = Evaluator::new(fx.proxy.decoder());
        Arc::clone(&fx.proxy).setup(&mut eval);

        let reply = eval.eval(VALUE_SET, &value_set_arg("E", "K", 1.0)).unwrap();
        assert_eq!(reply, UNIT_REPLY);
        assert_eq!(fx.targets[0].calls().len(), 1);
    }

    #[test]
    fn config_is_always_rejected() {
        let fx = fixture(&[]);
        assert!(!fx.proxy.config("targets = all"));
        assert!(!fx.proxy.config(""));
    }

    #[test]
    fn decode_failure_skips_replication() {
        let fx = fixture(&[true]);
        let outcome = fx.proxy.set_value("[]");
        assert!(outcome.report.is_none());
        assert!(outcome.reply.contains("MALFORMED_ARGUMENT"));
        assert!(fx.targets[0].calls().is_empty());
    }
}
