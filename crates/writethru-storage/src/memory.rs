//! In-memory implementation of [`StorageTarget`].
//!
//! [`MemoryTarget`] is a first-class backend for tests, scratch replicas,
//! and anywhere persistence isn't needed. Besides its copy of the data it
//! keeps a journal of every call it received, so replication traffic can be
//! inspected after the fact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use indexmap::IndexMap;

use writethru_core::{Entity, EntityId, Value};

use crate::error::StorageError;
use crate::store::AtomStore;
use crate::traits::StorageTarget;

/// One call received by a [`MemoryTarget`], recorded before it is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCall {
    StoreValue { entity: EntityId, key: EntityId },
    StoreEntity { entity: EntityId },
    UpdateValue {
        entity: EntityId,
        key: EntityId,
        delta: Value,
    },
    RemoveEntity { entity: EntityId, recursive: bool },
}

#[derive(Debug, Default)]
struct MemoryState {
    entities: IndexMap<EntityId, Entity>,
    values: HashMap<(EntityId, EntityId), Value>,
    journal: Vec<TargetCall>,
}

impl MemoryState {
    /// Copies `id` and its members out of `store`.
    fn copy_closure(&mut self, store: &AtomStore, id: EntityId) -> Result<(), StorageError> {
        for (member, entity) in store.closure(id)? {
            self.entities.entry(member).or_insert(entity);
        }
        Ok(())
    }

    fn dependents(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, entity)| entity.outgoing().contains(&id))
            .map(|(link, _)| *link)
            .collect()
    }

    fn remove_recursive(&mut self, id: EntityId) {
        for dependent in self.dependents(id) {
            self.remove_recursive(dependent);
        }
        self.entities.shift_remove(&id);
        self.values.retain(|(entity, _), _| *entity != id);
    }
}

/// In-memory replication target.
#[derive(Debug)]
pub struct MemoryTarget {
    name: String,
    connected: AtomicBool,
    state: Mutex<MemoryState>,
}

impl MemoryTarget {
    /// Creates a new empty target, connected.
    pub fn new(name: impl Into<String>) -> Self {
        MemoryTarget {
            name: name.into(),
            connected: AtomicBool::new(true),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Opens or closes the target.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.state.lock().unwrap().entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().unwrap().entities.len()
    }

    pub fn get_value(&self, entity: EntityId, key: EntityId) -> Option<Value> {
        self.state.lock().unwrap().values.get(&(entity, key)).cloned()
    }

    fn check_connected(&self) -> Result<(), StorageError> {
        if !self.connected() {
            return Err(StorageError::Disconnected {
                target: self.describe(),
            });
        }
        Ok(())
    }
}

impl StorageTarget for MemoryTarget {
    fn describe(&self) -> String {
        format!("MemoryTarget({})", self.name)
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn store_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TargetCall::StoreValue { entity, key });
        self.check_connected()?;

        state.copy_closure(store, entity)?;
        if store.contains(key) {
            state.copy_closure(store, key)?;
        }
        match store.get_value(entity, key) {
            Some(value) => state.values.insert((entity, key), value),
            None => state.values.remove(&(entity, key)),
        };
        Ok(())
    }

    fn store_entity(&self, store: &AtomStore, entity: EntityId) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TargetCall::StoreEntity { entity });
        self.check_connected()?;

        state.copy_closure(store, entity)?;
        state.values.retain(|(owner, _), _| *owner != entity);
        for (key, value) in store.values(entity) {
            state.values.insert((entity, key), value);
        }
        Ok(())
    }

    fn update_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
        delta: &Value,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TargetCall::UpdateValue {
            entity,
            key,
            delta: delta.clone(),
        });
        self.check_connected()?;

        state.copy_closure(store, entity)?;
        let merged = Value::apply_delta(state.values.get(&(entity, key)), delta);
        state.values.insert((entity, key), merged);
        Ok(())
    }

    fn remove_entity(&self, entity: EntityId, recursive: bool) -> Result<bool, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TargetCall::RemoveEntity { entity, recursive });
        self.check_connected()?;

        if !state.entities.contains_key(&entity) {
            return Ok(false);
        }
        if !recursive && !state.dependents(entity).is_empty() {
            return Ok(false);
        }
        state.remove_recursive(entity);
        Ok(true)
    }
}
