//! The authoritative in-memory graph store.
//!
//! [`AtomStore`] holds every entity, the values attached to them, and the
//! bindings between `StorageNode` entities and their backend targets.
//! Membership of links is mirrored in a petgraph `StableGraph` (edge from
//! link to member) so the dependents of an entity can be found without a
//! scan.

use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::{Directed, Direction};

use writethru_core::{
    Annotation, Entity, EntityId, EntitySpec, EntityType, Value, ANNOTATION_KEY_NAME,
};

use crate::error::StorageError;
use crate::traits::StorageTarget;

/// A store shared between sessions. Writers hold the lock only while
/// applying a mutation, never while replicating it.
pub type SharedStore = Arc<RwLock<AtomStore>>;

/// Everything the store keeps for one entity.
#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    /// Position in the membership graph
    index: NodeIndex<u32>,
    /// Values keyed by key entity, in insertion order
    values: IndexMap<EntityId, Value>,
    /// The annotation slot, exposed under the reserved annotation key
    annotation: Option<Annotation>,
}

/// In-memory graph store.
pub struct AtomStore {
    entities: IndexMap<EntityId, StoredEntity>,
    membership: StableGraph<EntityId, (), Directed, u32>,
    /// Targets bound to `StorageNode` entities, in attachment order
    targets: IndexMap<EntityId, Arc<dyn StorageTarget>>,
    read_only: bool,
    annotation_key: EntityId,
}

impl AtomStore {
    /// Creates a new empty, writable store.
    pub fn new() -> Self {
        AtomStore {
            entities: IndexMap::new(),
            membership: StableGraph::new(),
            targets: IndexMap::new(),
            read_only: false,
            annotation_key: EntityId::for_node(EntityType::PredicateNode, ANNOTATION_KEY_NAME),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Number of entities in the store.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).map(|stored| &stored.entity)
    }

    /// Id of the reserved annotation key. The key entity itself may not
    /// exist in the store yet.
    pub fn annotation_key_id(&self) -> EntityId {
        self.annotation_key
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    fn stored(&self, id: EntityId) -> Result<&StoredEntity, StorageError> {
        self.entities.get(&id).ok_or(StorageError::EntityNotFound(id))
    }

    fn stored_mut(&mut self, id: EntityId) -> Result<&mut StoredEntity, StorageError> {
        self.entities
            .get_mut(&id)
            .ok_or(StorageError::EntityNotFound(id))
    }

    // -------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------

    /// Resolves a spec to the id of an existing entity. Never creates.
    pub fn lookup(&self, spec: &EntitySpec) -> Option<EntityId> {
        spec.id().ok().filter(|id| self.contains(*id))
    }

    /// Adds the described entity (and, for links, its members). Idempotent.
    pub fn add(&mut self, spec: &EntitySpec) -> Result<EntityId, StorageError> {
        self.check_writable()?;
        // Validate the whole tree up front so a bad member adds nothing.
        spec.validate()?;
        self.insert_spec(spec)
    }

    fn insert_spec(&mut self, spec: &EntitySpec) -> Result<EntityId, StorageError> {
        for member in spec.outgoing.iter().flatten() {
            self.insert_spec(member)?;
        }
        let entity = spec.to_entity()?;
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Ok(id);
        }

        let index = self.membership.add_node(id);
        for member in entity.outgoing() {
            let member_index = self.entities[member].index;
            self.membership.add_edge(index, member_index, ());
        }
        self.entities.insert(
            id,
            StoredEntity {
                entity,
                index,
                values: IndexMap::new(),
                annotation: None,
            },
        );
        Ok(id)
    }

    /// Links that contain `id` directly, without duplicates.
    pub fn incoming(&self, id: EntityId) -> Vec<EntityId> {
        let Some(stored) = self.entities.get(&id) else {
            return Vec::new();
        };
        let mut dependents: Vec<EntityId> = Vec::new();
        for index in self
            .membership
            .neighbors_directed(stored.index, Direction::Incoming)
        {
            let dependent = self.membership[index];
            if !dependents.contains(&dependent) {
                dependents.push(dependent);
            }
        }
        dependents
    }

    /// Deletes an entity.
    ///
    /// Returns `Ok(false)` without changing anything when the entity has
    /// dependents and `recursive` is false. A recursive delete removes every
    /// dependent first. Deleting a `StorageNode` detaches its target.
    pub fn delete(&mut self, id: EntityId, recursive: bool) -> Result<bool, StorageError> {
        self.check_writable()?;
        self.stored(id)?;
        if !recursive && !self.incoming(id).is_empty() {
            return Ok(false);
        }
        self.remove_recursive(id);
        Ok(true)
    }

    fn remove_recursive(&mut self, id: EntityId) {
        for dependent in self.incoming(id) {
            if self.contains(dependent) {
                self.remove_recursive(dependent);
            }
        }
        if let Some(stored) = self.entities.shift_remove(&id) {
            self.membership.remove_node(stored.index);
            self.targets.shift_remove(&id);
        }
    }

    /// The entity and all of its members, members before the links that
    /// contain them.
    pub fn closure(&self, id: EntityId) -> Result<Vec<(EntityId, Entity)>, StorageError> {
        let mut out = Vec::new();
        self.collect_closure(id, &mut out)?;
        Ok(out)
    }

    fn collect_closure(
        &self,
        id: EntityId,
        out: &mut Vec<(EntityId, Entity)>,
    ) -> Result<(), StorageError> {
        if out.iter().any(|(seen, _)| *seen == id) {
            return Ok(());
        }
        let entity = &self.stored(id)?.entity;
        for member in entity.outgoing() {
            self.collect_closure(*member, out)?;
        }
        out.push((id, entity.clone()));
        Ok(())
    }

    // -------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------

    /// Sets the value at `key` on `entity`. Both must exist.
    ///
    /// Under the annotation key only annotations are accepted; they land in
    /// the annotation slot.
    pub fn set_value(
        &mut self,
        entity: EntityId,
        key: EntityId,
        value: Value,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.stored(key)?;
        if key == self.annotation_key {
            return match value {
                Value::Annotation(annotation) => self.set_annotation(entity, annotation),
                _ => Err(StorageError::IntegrityError {
                    reason: "annotation key only holds annotations".to_string(),
                }),
            };
        }
        self.stored_mut(entity)?.values.insert(key, value);
        Ok(())
    }

    /// Removes the value at `key`. Returns whether a value was present.
    pub fn clear_value(&mut self, entity: EntityId, key: EntityId) -> Result<bool, StorageError> {
        self.check_writable()?;
        let annotation_key = self.annotation_key;
        let stored = self.stored_mut(entity)?;
        if key == annotation_key {
            return Ok(stored.annotation.take().is_some());
        }
        Ok(stored.values.shift_remove(&key).is_some())
    }

    /// The current value at `key`, if any.
    pub fn get_value(&self, entity: EntityId, key: EntityId) -> Option<Value> {
        let stored = self.entities.get(&entity)?;
        if key == self.annotation_key {
            return stored.annotation.map(Value::Annotation);
        }
        stored.values.get(&key).cloned()
    }

    /// All values on `entity`, the annotation (if set) last.
    pub fn values(&self, entity: EntityId) -> Vec<(EntityId, Value)> {
        let Some(stored) = self.entities.get(&entity) else {
            return Vec::new();
        };
        let mut values: Vec<(EntityId, Value)> = stored
            .values
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect();
        if let Some(annotation) = stored.annotation {
            values.push((self.annotation_key, Value::Annotation(annotation)));
        }
        values
    }

    /// Merges `delta` into the value at `key` and returns the new value.
    pub fn update_value(
        &mut self,
        entity: EntityId,
        key: EntityId,
        delta: &Value,
    ) -> Result<Value, StorageError> {
        let merged = Value::apply_delta(self.get_value(entity, key).as_ref(), delta);
        self.set_value(entity, key, merged.clone())?;
        Ok(merged)
    }

    pub fn set_annotation(
        &mut self,
        entity: EntityId,
        annotation: Annotation,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.stored_mut(entity)?.annotation = Some(annotation);
        Ok(())
    }

    pub fn annotation(&self, entity: EntityId) -> Option<Annotation> {
        self.entities.get(&entity)?.annotation
    }

    // -------------------------------------------------------------------
    // Targets
    // -------------------------------------------------------------------

    /// Creates `(StorageNode "name")` and binds `target` to it, replacing
    /// any earlier binding for the same name.
    pub fn attach_target(
        &mut self,
        name: &str,
        target: Arc<dyn StorageTarget>,
    ) -> Result<EntityId, StorageError> {
        let id = self.add(&EntitySpec::node(EntityType::StorageNode, name))?;
        self.targets.insert(id, target);
        Ok(id)
    }

    /// Every bound target, in attachment order, connected or not.
    pub fn enumerate_targets(&self) -> Vec<(EntityId, Arc<dyn StorageTarget>)> {
        self.targets
            .iter()
            .map(|(id, target)| (*id, Arc::clone(target)))
            .collect()
    }
}

impl Default for AtomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AtomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomStore")
            .field("entities", &self.entities.len())
            .field("targets", &self.targets.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}
