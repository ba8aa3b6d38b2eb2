//! Client sessions.
//!
//! Each session owns an [`Evaluator`]. [`SessionRegistry`] tracks open
//! sessions by UUID so HTTP handlers can route `eval` requests to the right
//! dispatch table. A session evaluates one command at a time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eval::Evaluator;

/// Unique session identifier (UUID v4 newtype).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session's evaluator. Holding the lock is what makes a command run
/// to completion before the next one on the same session starts.
pub type SharedEvaluator = Arc<Mutex<Evaluator>>;

/// An open session and its dispatch table.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub evaluator: SharedEvaluator,
    pub opened_at: Instant,
    pub last_active: Instant,
}

/// Registry of open sessions, safe to share across handler tasks.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    /// Opens a session around an already set-up evaluator.
    pub fn open(&self, evaluator: Evaluator) -> SessionId {
        let id = SessionId(Uuid::new_v4());
        let now = Instant::now();
        self.sessions.insert(
            id,
            Session {
                id,
                evaluator: Arc::new(Mutex::new(evaluator)),
                opened_at: now,
                last_active: now,
            },
        );
        tracing::debug!("opened session {}", id);
        id
    }

    /// Closes a session. Returns `true` if it was open.
    pub fn close(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// The session's evaluator, marking the session active.
    ///
    /// Every caller gets the same handle; lock it to evaluate.
    pub fn evaluator(&self, id: &SessionId) -> Option<SharedEvaluator> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.last_active = Instant::now();
        Some(Arc::clone(&entry.evaluator))
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes sessions idle longer than `timeout`. Returns how many closed.
    pub fn sweep_inactive(&self, timeout: Duration) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.duration_since(session.last_active) < timeout);
        before - self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::decoder::Decoder;
    use writethru_storage::AtomStore;

    fn evaluator() -> Evaluator {
        let store = Arc::new(RwLock::new(AtomStore::new()));
        Evaluator::new(Arc::new(Decoder::new(store)))
    }

    #[test]
    fn open_and_close() {
        let registry = SessionRegistry::new();
        let id = registry.open(evaluator());
        assert_eq!(registry.len(), 1);
        assert!(registry.evaluator(&id).is_some());

        assert!(registry.close(&id));
        assert!(!registry.close(&id));
        assert!(registry.evaluator(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn session_commands_share_one_evaluator() {
        let registry = SessionRegistry::new();
        let id = registry.open(evaluator());
        let first = registry.evaluator(&id).unwrap();
        let second = registry.evaluator(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // While one command holds the session, a second one cannot start.
        let running = first.lock().unwrap();
        assert!(second.try_lock().is_err());
        drop(running);
        assert!(second.try_lock().is_ok());
    }

    #[test]
    fn ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.open(evaluator());
        let b = registry.open(evaluator());
        assert_ne!(a, b);
        let mut ids = registry.ids();
        ids.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);
        assert_eq!(ids, expected);
    }

    #[test]
    fn sweep_keeps_recent_sessions() {
        let registry = SessionRegistry::new();
        registry.open(evaluator());
        assert_eq!(registry.sweep_inactive(Duration::from_secs(3600)), 0);
        assert_eq!(registry.sweep_inactive(Duration::ZERO), 1);
        assert!(registry.is_empty());
    }
}
