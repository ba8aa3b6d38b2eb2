//! SQLite implementation of [`StorageTarget`].
//!
//! [`SqliteTarget`] persists replicated entities and values in a SQLite
//! database with WAL mode, one transaction per replicated write, and
//! automatic schema migrations. Entities and values are stored as JSON TEXT
//! columns via serde_json.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use writethru_core::{Entity, EntityId, Value};

use crate::error::StorageError;
use crate::store::AtomStore;
use crate::traits::StorageTarget;

/// SQLite-backed replication target.
///
/// The target is connected while it holds an open connection; [`close`]
/// drops the connection and every later write fails with
/// [`StorageError::Disconnected`].
///
/// [`close`]: SqliteTarget::close
pub struct SqliteTarget {
    location: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteTarget {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteTarget {
            location: path.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteTarget {
            location: ":memory:".to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Closes the connection. The target reports disconnected afterwards.
    pub fn close(&self) {
        self.conn.lock().unwrap().take();
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock().unwrap();
        let conn = guard.as_mut().ok_or_else(|| StorageError::Disconnected {
            target: self.describe(),
        })?;
        f(conn)
    }

    // -----------------------------------------------------------------------
    // Read helpers
    // -----------------------------------------------------------------------

    /// Number of stored entities.
    pub fn entity_count(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Every stored entity, ordered by id.
    pub fn list_entities(&self) -> Result<Vec<(EntityId, Entity)>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, body FROM entities ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, body)| -> Result<(EntityId, Entity), StorageError> {
                    Ok((id.parse()?, serde_json::from_str(&body)?))
                })
                .collect()
        })
    }

    /// Loads one entity, if stored.
    pub fn load_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        self.with_conn(|conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM entities WHERE id = ?1",
                    params![id.to_hex()],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| serde_json::from_str(&b).map_err(StorageError::from))
                .transpose()
        })
    }

    /// Loads every value stored on `entity`.
    pub fn load_values(&self, entity: EntityId) -> Result<Vec<(EntityId, Value)>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key_id, value FROM entity_values WHERE entity_id = ?1 ORDER BY key_id",
            )?;
            let rows = stmt
                .query_map(params![entity.to_hex()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(key, value)| -> Result<(EntityId, Value), StorageError> {
                    Ok((key.parse()?, serde_json::from_str(&value)?))
                })
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped helpers
// ---------------------------------------------------------------------------

/// Inserts `id` and its members, skipping entities already present.
fn insert_closure(tx: &Transaction, store: &AtomStore, id: EntityId) -> Result<(), StorageError> {
    for (member_id, entity) in store.closure(id)? {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO entities (id, kind, body) VALUES (?1, ?2, ?3)",
            params![
                member_id.to_hex(),
                entity.kind().as_str(),
                serde_json::to_string(&entity)?
            ],
        )?;
        if inserted == 0 {
            continue;
        }
        for (position, member) in entity.outgoing().iter().enumerate() {
            tx.execute(
                "INSERT INTO entity_members (link_id, position, member_id) VALUES (?1, ?2, ?3)",
                params![member_id.to_hex(), position as i64, member.to_hex()],
            )?;
        }
    }
    Ok(())
}

fn upsert_value(
    tx: &Transaction,
    entity: EntityId,
    key: EntityId,
    value: &Value,
) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO entity_values (entity_id, key_id, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (entity_id, key_id) DO UPDATE SET value = excluded.value",
        params![entity.to_hex(), key.to_hex(), serde_json::to_string(value)?],
    )?;
    Ok(())
}

fn load_value(
    tx: &Transaction,
    entity: EntityId,
    key: EntityId,
) -> Result<Option<Value>, StorageError> {
    let raw: Option<String> = tx
        .query_row(
            "SELECT value FROM entity_values WHERE entity_id = ?1 AND key_id = ?2",
            params![entity.to_hex(), key.to_hex()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
}

fn dependents(tx: &Transaction, id: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt =
        tx.prepare("SELECT DISTINCT link_id FROM entity_members WHERE member_id = ?1")?;
    let links = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(links)
}

fn remove_recursive(tx: &Transaction, id: &str) -> Result<(), StorageError> {
    for link in dependents(tx, id)? {
        remove_recursive(tx, &link)?;
    }
    // Member rows and values go with the entity via ON DELETE CASCADE.
    tx.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
    Ok(())
}

impl StorageTarget for SqliteTarget {
    fn describe(&self) -> String {
        format!("SqliteTarget({})", self.location)
    }

    fn connected(&self) -> bool {
        self.conn.lock().unwrap().is_some()
    }

    fn store_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
    ) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            insert_closure(&tx, store, entity)?;
            if store.contains(key) {
                insert_closure(&tx, store, key)?;
            }
            match store.get_value(entity, key) {
                Some(value) => upsert_value(&tx, entity, key, &value)?,
                None => {
                    tx.execute(
                        "DELETE FROM entity_values WHERE entity_id = ?1 AND key_id = ?2",
                        params![entity.to_hex(), key.to_hex()],
                    )?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn store_entity(&self, store: &AtomStore, entity: EntityId) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            insert_closure(&tx, store, entity)?;
            tx.execute(
                "DELETE FROM entity_values WHERE entity_id = ?1",
                params![entity.to_hex()],
            )?;
            for (key, value) in store.values(entity) {
                upsert_value(&tx, entity, key, &value)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn update_value(
        &self,
        store: &AtomStore,
        entity: EntityId,
        key: EntityId,
        delta: &Value,
    ) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            insert_closure(&tx, store, entity)?;
            let current = load_value(&tx, entity, key)?;
            let merged = Value::apply_delta(current.as_ref(), delta);
            upsert_value(&tx, entity, key, &merged)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn remove_entity(&self, entity: EntityId, recursive: bool) -> Result<bool, StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id = entity.to_hex();
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }
            if !recursive && !dependents(&tx, &id)?.is_empty() {
                return Ok(false);
            }
            remove_recursive(&tx, &id)?;
            tx.commit()?;
            Ok(true)
        })
    }
}
