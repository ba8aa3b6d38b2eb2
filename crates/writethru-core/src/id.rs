//! Content-derived entity identifiers.
//!
//! An [`EntityId`] is the blake3 hash of an entity's canonical form, so the
//! same entity description maps to the same id in every store and on every
//! replication target. Ids never need to be allocated or coordinated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::EntityType;
use crate::error::CoreError;

/// Stable, content-identified handle to an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub [u8; 32]);

// Tags that keep node and link preimages disjoint.
const NODE_TAG: u8 = 0x4e;
const LINK_TAG: u8 = 0x4c;

impl EntityId {
    /// Id of the node `kind "name"`.
    pub fn for_node(kind: EntityType, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[NODE_TAG]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        EntityId(*hasher.finalize().as_bytes())
    }

    /// Id of the link `kind` over `outgoing`, in order.
    pub fn for_link(kind: EntityType, outgoing: &[EntityId]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[LINK_TAG]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(outgoing.len() as u64).to_le_bytes());
        for member in outgoing {
            hasher.update(&member.0);
        }
        EntityId(*hasher.finalize().as_bytes())
    }

    /// Full 64-digit lowercase hex form.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }
}

// Display prints the short form; use `to_hex` for the full id.
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = blake3::Hash::from_bytes(self.0).to_hex();
        f.write_str(&hex.as_str()[..16])
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s)
            .map(|hash| EntityId(*hash.as_bytes()))
            .map_err(|_| CoreError::InvalidEntityId {
                input: s.to_string(),
            })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
