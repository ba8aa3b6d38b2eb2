//! Entity data model: typed nodes and links.
//!
//! [`Entity`] is the stored form (links refer to members by [`EntityId`]).
//! [`EntitySpec`] is the recursive wire form that clients send; it can be
//! hashed to its id without consulting any store.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::EntityId;

/// Name of the reserved key under which annotations are replicated.
pub const ANNOTATION_KEY_NAME: &str = "*-AnnotationKey-*";

/// The closed set of entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ConceptNode,
    PredicateNode,
    /// Marks an entity bound to a backend storage target.
    StorageNode,
    ListLink,
    EvaluationLink,
    MemberLink,
    InheritanceLink,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ConceptNode => "ConceptNode",
            EntityType::PredicateNode => "PredicateNode",
            EntityType::StorageNode => "StorageNode",
            EntityType::ListLink => "ListLink",
            EntityType::EvaluationLink => "EvaluationLink",
            EntityType::MemberLink => "MemberLink",
            EntityType::InheritanceLink => "InheritanceLink",
        }
    }

    /// Returns `true` for link types (entities with an outgoing set).
    pub fn is_link(&self) -> bool {
        matches!(
            self,
            EntityType::ListLink
                | EntityType::EvaluationLink
                | EntityType::MemberLink
                | EntityType::InheritanceLink
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored entity. Immutable: only the values attached to it change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape")]
pub enum Entity {
    Node {
        kind: EntityType,
        name: String,
    },
    Link {
        kind: EntityType,
        outgoing: SmallVec<[EntityId; 2]>,
    },
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Node { kind, name } => EntityId::for_node(*kind, name),
            Entity::Link { kind, outgoing } => EntityId::for_link(*kind, outgoing),
        }
    }

    pub fn kind(&self) -> EntityType {
        match self {
            Entity::Node { kind, .. } | Entity::Link { kind, .. } => *kind,
        }
    }

    /// Members of a link; empty for nodes.
    pub fn outgoing(&self) -> &[EntityId] {
        match self {
            Entity::Node { .. } => &[],
            Entity::Link { outgoing, .. } => outgoing,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Node { kind, name } => write!(f, "({} \"{}\")", kind, name),
            Entity::Link { kind, outgoing } => {
                write!(f, "({}", kind)?;
                for member in outgoing {
                    write!(f, " {}", member)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Recursive wire description of an entity.
///
/// Nodes carry `name`, links carry `outgoing`:
/// `{"type":"ListLink","outgoing":[{"type":"ConceptNode","name":"a"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    #[serde(rename = "type")]
    pub kind: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<Vec<EntitySpec>>,
}

impl EntitySpec {
    pub fn node(kind: EntityType, name: impl Into<String>) -> Self {
        EntitySpec {
            kind,
            name: Some(name.into()),
            outgoing: None,
        }
    }

    pub fn link(kind: EntityType, outgoing: Vec<EntitySpec>) -> Self {
        EntitySpec {
            kind,
            name: None,
            outgoing: Some(outgoing),
        }
    }

    /// Checks that the shape matches the type, recursively.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: &str| CoreError::InvalidEntity {
            kind: self.kind,
            reason: reason.to_string(),
        };
        match (self.kind.is_link(), &self.name, &self.outgoing) {
            (false, Some(_), None) => Ok(()),
            (false, None, _) => Err(invalid("node requires a name")),
            (false, Some(_), Some(_)) => Err(invalid("node cannot have an outgoing set")),
            (true, None, Some(members)) => members.iter().try_for_each(EntitySpec::validate),
            (true, _, None) => Err(invalid("link requires an outgoing set")),
            (true, Some(_), Some(_)) => Err(invalid("link cannot have a name")),
        }
    }

    /// Computes the content id of the described entity.
    pub fn id(&self) -> Result<EntityId, CoreError> {
        self.validate()?;
        Ok(self.id_unchecked())
    }

    fn id_unchecked(&self) -> EntityId {
        match (&self.name, &self.outgoing) {
            (Some(name), _) => EntityId::for_node(self.kind, name),
            (None, members) => {
                let ids: Vec<EntityId> = members
                    .iter()
                    .flatten()
                    .map(EntitySpec::id_unchecked)
                    .collect();
                EntityId::for_link(self.kind, &ids)
            }
        }
    }

    /// Converts to the stored form. Members are referenced by id only.
    pub fn to_entity(&self) -> Result<Entity, CoreError> {
        self.validate()?;
        Ok(match (&self.name, &self.outgoing) {
            (Some(name), _) => Entity::Node {
                kind: self.kind,
                name: name.clone(),
            },
            (None, members) => Entity::Link {
                kind: self.kind,
                outgoing: members
                    .iter()
                    .flatten()
                    .map(EntitySpec::id_unchecked)
                    .collect(),
            },
        })
    }
}

/// The reserved key entity annotations are stored under.
pub fn annotation_key_spec() -> EntitySpec {
    EntitySpec::node(EntityType::PredicateNode, ANNOTATION_KEY_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn concept(name: &str) -> EntitySpec {
        EntitySpec::node(EntityType::ConceptNode, name)
    }

    #[test]
    fn node_spec_parses_from_json() {
        let spec: EntitySpec =
            serde_json::from_str(r#"{"type":"ConceptNode","name":"cat"}"#).unwrap();
        assert_eq!(spec, concept("cat"));
    }

    #[test]
    fn link_spec_parses_from_json() {
        let spec: EntitySpec = serde_json::from_str(
            r#"{"type":"ListLink","outgoing":[{"type":"ConceptNode","name":"a"}]}"#,
        )
        .unwrap();
        assert_eq!(spec, EntitySpec::link(EntityType::ListLink, vec![concept("a")]));
    }

    #[test]
    fn node_without_name_is_invalid() {
        let spec = EntitySpec {
            kind: EntityType::ConceptNode,
            name: None,
            outgoing: None,
        };
        assert!(matches!(spec.validate(), Err(CoreError::InvalidEntity { .. })));
    }

    #[test]
    fn link_with_name_is_invalid() {
        let spec = EntitySpec {
            kind: EntityType::ListLink,
            name: Some("x".into()),
            outgoing: Some(vec![]),
        };
        assert!(spec.id().is_err());
    }

    #[test]
    fn invalid_member_invalidates_link() {
        let bad = EntitySpec {
            kind: EntityType::ListLink,
            name: None,
            outgoing: None,
        };
        let spec = EntitySpec::link(EntityType::MemberLink, vec![concept("a"), bad]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_id_matches_entity_id() {
        let spec = EntitySpec::link(
            EntityType::EvaluationLink,
            vec![
                EntitySpec::node(EntityType::PredicateNode, "likes"),
                EntitySpec::link(EntityType::ListLink, vec![concept("a"), concept("b")]),
            ],
        );
        let entity = spec.to_entity().unwrap();
        assert_eq!(entity.id(), spec.id().unwrap());
        assert_eq!(entity.outgoing().len(), 2);
    }

    #[test]
    fn annotation_key_is_a_predicate() {
        let spec = annotation_key_spec();
        assert_eq!(spec.kind, EntityType::PredicateNode);
        assert_eq!(spec.name.as_deref(), Some(ANNOTATION_KEY_NAME));
    }

    #[test]
    fn entity_display() {
        let node = concept("cat").to_entity().unwrap();
        assert_eq!(node.to_string(), "(ConceptNode \"cat\")");
    }

    proptest! {
        #[test]
        fn equal_names_hash_equal(name in ".*") {
            prop_assert_eq!(concept(&name).id().unwrap(), concept(&name).id().unwrap());
        }

        #[test]
        fn distinct_names_hash_distinct(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assume!(a != b);
            prop_assert_ne!(concept(&a).id().unwrap(), concept(&b).id().unwrap());
        }

        #[test]
        fn link_id_depends_on_members(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assume!(a != b);
            let la = EntitySpec::link(EntityType::ListLink, vec![concept(&a)]);
            let lb = EntitySpec::link(EntityType::ListLink, vec![concept(&b)]);
            prop_assert_ne!(la.id().unwrap(), lb.id().unwrap());
        }
    }
}
