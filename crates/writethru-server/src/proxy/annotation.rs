//! Lazily created key entity for annotation replication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use writethru_core::{annotation_key_spec, EntityId};
use writethru_storage::{SharedStore, StorageError};

/// Creates the reserved annotation key on first use and remembers it.
///
/// The check and the creation happen under one lock, so concurrent first
/// calls create the key once. The cached id is never invalidated: if the
/// host swaps its store, the cache keeps pointing at the key of the store
/// it was first resolved against.
pub struct AnnotationKeyCache {
    key: Mutex<Option<EntityId>>,
    creations: AtomicUsize,
}

impl AnnotationKeyCache {
    pub fn new() -> Self {
        AnnotationKeyCache {
            key: Mutex::new(None),
            creations: AtomicUsize::new(0),
        }
    }

    /// Returns the cached key, creating it in `store` if needed.
    pub fn get_or_create(&self, store: &SharedStore) -> Result<EntityId, StorageError> {
        let mut slot = self.key.lock().unwrap();
        if let Some(key) = *slot {
            return Ok(key);
        }
        let key = store.write().unwrap().add(&annotation_key_spec())?;
        self.creations.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("created annotation key {}", key);
        *slot = Some(key);
        Ok(key)
    }

    /// The key, if it has been created.
    pub fn cached(&self) -> Option<EntityId> {
        *self.key.lock().unwrap()
    }

    /// How many times the key entity was created (0 or 1).
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

impl Default for AnnotationKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use super::*;
    use writethru_storage::AtomStore;

    #[test]
    fn creates_once_and_reuses() {
        let store = Arc::new(RwLock::new(AtomStore::new()));
        let cache = AnnotationKeyCache::new();
        assert_eq!(cache.cached(), None);

        let first = cache.get_or_create(&store).unwrap();
        let second = cache.get_or_create(&store).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.creations(), 1);
        assert!(store.read().unwrap().contains(first));
        assert_eq!(store.read().unwrap().annotation_key_id(), first);
    }

    #[test]
    fn read_only_store_fails_without_caching() {
        let store = Arc::new(RwLock::new(AtomStore::new()));
        store.write().unwrap().set_read_only(true);
        let cache = AnnotationKeyCache::new();

        assert!(matches!(cache.get_or_create(&store), Err(StorageError::ReadOnly)));
        assert_eq!(cache.cached(), None);
        assert_eq!(cache.creations(), 0);
    }
}
