//! Wire-level command decoding.
//!
//! [`Decoder`] turns the JSON argument of a mutation command into resolved
//! entity ids, applies the mutation to the local store, and only then hands
//! the ids to a callback. The callback runs after the store lock has been
//! released, so it is free to read the store (or replicate from it).
//!
//! Replies follow the wire convention: `()` for a completed mutation,
//! `#t` / `#f` for boolean-shaped results, and a JSON error object for
//! anything that failed to decode or apply.

use serde::{Deserialize, Serialize};

use writethru_core::{Annotation, EntityId, EntitySpec, Value};
use writethru_storage::{SharedStore, StorageError};

/// Reply for a mutation that was applied.
pub const UNIT_REPLY: &str = "()";
/// Boolean-shaped success reply.
pub const TRUE_REPLY: &str = "#t";
/// Boolean-shaped failure reply.
pub const FALSE_REPLY: &str = "#f";

/// Argument of `value-set`. A `null` value clears the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetValueArg {
    pub entity: EntitySpec,
    pub key: EntitySpec,
    #[serde(default)]
    pub value: Option<Value>,
}

/// One key/value pair of a `values-set` argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueArg {
    pub key: EntitySpec,
    pub value: Value,
}

/// Argument of `values-set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetValuesArg {
    pub entity: EntitySpec,
    pub values: Vec<KeyValueArg>,
}

/// Argument of `annotation-set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAnnotationArg {
    pub entity: EntitySpec,
    pub annotation: Annotation,
}

/// Argument of `value-update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateValueArg {
    pub entity: EntitySpec,
    pub key: EntitySpec,
    pub delta: Value,
}

/// Errors raised while decoding or locally applying a command.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The argument was not valid JSON for this command.
    #[error("malformed argument: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The local store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StorageError),
}

impl DecodeError {
    /// Machine-readable error code used in error replies.
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "MALFORMED_ARGUMENT",
            DecodeError::Store(StorageError::Core(_)) => "INVALID_ENTITY",
            DecodeError::Store(StorageError::ReadOnly) => "READ_ONLY",
            DecodeError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Formats a decode failure as a wire reply.
pub fn error_reply(err: &DecodeError) -> String {
    serde_json::json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
        }
    })
    .to_string()
}

/// Decodes command arguments against a shared store.
pub struct Decoder {
    store: SharedStore,
}

impl Decoder {
    pub fn new(store: SharedStore) -> Self {
        Decoder { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Looks the entity up and deletes it under one write lock.
    ///
    /// `Ok(None)` if the entity does not exist, otherwise its id and whether
    /// the local store removed it.
    pub fn delete(
        &self,
        arg: &str,
        recursive: bool,
    ) -> Result<Option<(EntityId, bool)>, DecodeError> {
        let spec: EntitySpec = serde_json::from_str(arg)?;
        spec.validate().map_err(StorageError::from)?;
        let mut store = self.store.write().unwrap();
        let Some(id) = store.lookup(&spec) else {
            return Ok(None);
        };
        let deleted = store.delete(id, recursive)?;
        Ok(Some((id, deleted)))
    }

    /// Local-only deletion: `#t` if the entity is gone afterwards (including
    /// when it never existed), `#f` if it has dependents and `recursive` is
    /// false.
    pub fn extract(&self, arg: &str, recursive: bool) -> String {
        match self.delete(arg, recursive) {
            Ok(None) | Ok(Some((_, true))) => TRUE_REPLY.to_string(),
            Ok(Some((_, false))) => FALSE_REPLY.to_string(),
            Err(err) => error_reply(&err),
        }
    }

    /// `value-set`: callback receives `(entity, key, new value)`.
    pub fn set_value(
        &self,
        arg: &str,
        callback: impl FnOnce(EntityId, EntityId, Option<&Value>),
    ) -> String {
        match self.apply_set_value(arg) {
            Ok((entity, key, value)) => {
                callback(entity, key, value.as_ref());
                UNIT_REPLY.to_string()
            }
            Err(err) => error_reply(&err),
        }
    }

    fn apply_set_value(
        &self,
        arg: &str,
    ) -> Result<(EntityId, EntityId, Option<Value>), DecodeError> {
        let parsed: SetValueArg = serde_json::from_str(arg)?;
        let mut store = self.store.write().unwrap();
        let entity = store.add(&parsed.entity)?;
        let key = store.add(&parsed.key)?;
        match &parsed.value {
            Some(value) => store.set_value(entity, key, value.clone())?,
            None => {
                store.clear_value(entity, key)?;
            }
        }
        Ok((entity, key, parsed.value))
    }

    /// `values-set`: callback receives the entity whose values changed.
    pub fn set_values(&self, arg: &str, callback: impl FnOnce(EntityId)) -> String {
        match self.apply_set_values(arg) {
            Ok(entity) => {
                callback(entity);
                UNIT_REPLY.to_string()
            }
            Err(err) => error_reply(&err),
        }
    }

    fn apply_set_values(&self, arg: &str) -> Result<EntityId, DecodeError> {
        let parsed: SetValuesArg = serde_json::from_str(arg)?;
        let mut store = self.store.write().unwrap();
        let entity = store.add(&parsed.entity)?;
        for pair in parsed.values {
            let key = store.add(&pair.key)?;
            store.set_value(entity, key, pair.value)?;
        }
        Ok(entity)
    }

    /// `annotation-set`: callback receives `(entity, annotation)`.
    pub fn set_annotation(
        &self,
        arg: &str,
        callback: impl FnOnce(EntityId, Annotation),
    ) -> String {
        match self.apply_set_annotation(arg) {
            Ok((entity, annotation)) => {
                callback(entity, annotation);
                UNIT_REPLY.to_string()
            }
            Err(err) => error_reply(&err),
        }
    }

    fn apply_set_annotation(&self, arg: &str) -> Result<(EntityId, Annotation), DecodeError> {
        let parsed: SetAnnotationArg = serde_json::from_str(arg)?;
        let mut store = self.store.write().unwrap();
        let entity = store.add(&parsed.entity)?;
        store.set_annotation(entity, parsed.annotation)?;
        Ok((entity, parsed.annotation))
    }

    /// `value-update`: callback receives `(entity, key, delta)`.
    pub fn update_value(
        &self,
        arg: &str,
        callback: impl FnOnce(EntityId, EntityId, &Value),
    ) -> String {
        match self.apply_update_value(arg) {
            Ok((entity, key, delta)) => {
                callback(entity, key, &delta);
                UNIT_REPLY.to_string()
            }
            Err(err) => error_reply(&err),
        }
    }

    fn apply_update_value(&self, arg: &str) -> Result<(EntityId, EntityId, Value), DecodeError> {
        let parsed: UpdateValueArg = serde_json::from_str(arg)?;
        let mut store = self.store.write().unwrap();
        let entity = store.add(&parsed.entity)?;
        let key = store.add(&parsed.key)?;
        store.update_value(entity, key, &parsed.delta)?;
        Ok((entity, key, parsed.delta))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use super::*;
    use writethru_core::EntityType;
    use writethru_storage::AtomStore;

    fn decoder() -> Decoder {
        Decoder::new(Arc::new(RwLock::new(AtomStore::new())))
    }

    fn concept(name: &str) -> EntitySpec {
        EntitySpec::node(EntityType::ConceptNode, name)
    }

    fn predicate(name: &str) -> EntitySpec {
        EntitySpec::node(EntityType::PredicateNode, name)
    }

    fn set_value_arg(value: Option<Value>) -> String {
        serde_json::to_string(&SetValueArg {
            entity: concept("cat"),
            key: predicate("weight"),
            value,
        })
        .unwrap()
    }

    #[test]
    fn set_value_applies_then_calls_back() {
        let decoder = decoder();
        let mut seen = None;
        let reply = decoder.set_value(&set_value_arg(Some(Value::floats(vec![3.0]))), |e, k, v| {
            seen = Some((e, k, v.cloned()));
        });

        assert_eq!(reply, UNIT_REPLY);
        let (entity, key, value) = seen.unwrap();
        assert_eq!(entity, concept("cat").id().unwrap());
        assert_eq!(value, Some(Value::floats(vec![3.0])));
        let store = decoder.store().read().unwrap();
        assert_eq!(store.get_value(entity, key), Some(Value::floats(vec![3.0])));
    }

    #[test]
    fn null_value_clears_key() {
        let decoder = decoder();
        decoder.set_value(&set_value_arg(Some(Value::floats(vec![3.0]))), |_, _, _| {});
        let mut cleared = false;
        decoder.set_value(&set_value_arg(None), |_, _, v| cleared = v.is_none());

        assert!(cleared);
        let store = decoder.store().read().unwrap();
        let cat = concept("cat").id().unwrap();
        let weight = predicate("weight").id().unwrap();
        assert_eq!(store.get_value(cat, weight), None);
    }

    #[test]
    fn malformed_argument_skips_callback() {
        let decoder = decoder();
        let mut called = false;
        let reply = decoder.set_value("{not json", |_, _, _| called = true);

        assert!(!called);
        let body: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(body["error"]["code"], "MALFORMED_ARGUMENT");
    }

    #[test]
    fn invalid_entity_is_reported() {
        let decoder = decoder();
        let reply = decoder.set_annotation(
            r#"{"entity":{"type":"ConceptNode"},"annotation":{"strength":1.0,"confidence":1.0}}"#,
            |_, _| panic!("callback must not run"),
        );
        let body: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(body["error"]["code"], "INVALID_ENTITY");
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let decoder = decoder();
        decoder.store().write().unwrap().set_read_only(true);
        let reply = decoder.set_value(&set_value_arg(Some(Value::floats(vec![1.0]))), |_, _, _| {
            panic!("callback must not run")
        });
        let body: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(body["error"]["code"], "READ_ONLY");
    }

    #[test]
    fn set_values_sets_every_pair() {
        let decoder = decoder();
        let arg = serde_json::to_string(&SetValuesArg {
            entity: concept("cat"),
            values: vec![
                KeyValueArg {
                    key: predicate("weight"),
                    value: Value::floats(vec![4.0]),
                },
                KeyValueArg {
                    key: predicate("color"),
                    value: Value::strings(["grey"]),
                },
            ],
        })
        .unwrap();

        let mut entity = None;
        assert_eq!(decoder.set_values(&arg, |e| entity = Some(e)), UNIT_REPLY);
        let store = decoder.store().read().unwrap();
        assert_eq!(store.values(entity.unwrap()).len(), 2);
    }

    #[test]
    fn update_value_passes_delta_not_result() {
        let decoder = decoder();
        let arg = serde_json::to_string(&UpdateValueArg {
            entity: concept("cat"),
            key: predicate("count"),
            delta: Value::floats(vec![1.0]),
        })
        .unwrap();

        decoder.update_value(&arg, |_, _, _| {});
        let mut delta = None;
        decoder.update_value(&arg, |_, _, d| delta = Some(d.clone()));

        assert_eq!(delta, Some(Value::floats(vec![1.0])));
        let store = decoder.store().read().unwrap();
        let cat = concept("cat").id().unwrap();
        let count = predicate("count").id().unwrap();
        assert_eq!(store.get_value(cat, count), Some(Value::floats(vec![2.0])));
    }

    #[test]
    fn extract_of_missing_entity_is_true() {
        let decoder = decoder();
        let arg = serde_json::to_string(&concept("ghost")).unwrap();
        assert_eq!(decoder.extract(&arg, false), TRUE_REPLY);
    }

    #[test]
    fn extract_with_dependents_is_false_unless_recursive() {
        let decoder = decoder();
        decoder
            .store()
            .write()
            .unwrap()
            .add(&EntitySpec::link(EntityType::ListLink, vec![concept("a")]))
            .unwrap();
        let arg = serde_json::to_string(&concept("a")).unwrap();

        assert_eq!(decoder.extract(&arg, false), FALSE_REPLY);
        assert_eq!(decoder.extract(&arg, true), TRUE_REPLY);
        assert!(decoder.store().read().unwrap().is_empty());
    }

    #[test]
    fn delete_of_missing_entity_on_read_only_store_is_true() {
        let decoder = decoder();
        decoder.store().write().unwrap().set_read_only(true);
        let arg = serde_json::to_string(&concept("ghost")).unwrap();
        assert!(decoder.delete(&arg, false).unwrap().is_none());
        assert_eq!(decoder.extract(&arg, false), TRUE_REPLY);
    }
}
