//! Application state shared by all HTTP handlers.
//!
//! [`AppState`] holds the local store, the write-through proxy bound to it,
//! and the open sessions. The store sits behind a `std::sync::RwLock`:
//! critical sections are short and never span an `.await`.

use std::sync::{Arc, RwLock};

use writethru_storage::{AtomStore, SharedStore, StorageTarget};

use crate::config::{ServerConfig, TargetConfig};
use crate::error::ApiError;
use crate::eval::Evaluator;
use crate::proxy::{Proxy, WriteThruProxy};
use crate::session::{SessionId, SessionRegistry};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The local graph store.
    pub store: SharedStore,
    /// The write-through proxy, initialized against `store`.
    pub proxy: Arc<WriteThruProxy>,
    /// Open client sessions.
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Builds the store from `config`, attaches its targets, and initializes
    /// the proxy.
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let mut store = AtomStore::new();
        for target in &config.targets {
            attach(&mut store, target)?;
        }
        store.set_read_only(config.read_only);
        Ok(Self::with_store(store))
    }

    /// Creates state around an empty, writable store with no targets.
    pub fn in_memory() -> Self {
        Self::with_store(AtomStore::new())
    }

    fn with_store(store: AtomStore) -> Self {
        let store: SharedStore = Arc::new(RwLock::new(store));
        let proxy = Arc::new(WriteThruProxy::new(Arc::clone(&store)));
        proxy.init();
        AppState {
            store,
            proxy,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Opens a session whose evaluator has been set up by the proxy.
    ///
    /// Returns the session id and the installed handler names.
    pub fn open_session(&self) -> (SessionId, Vec<String>) {
        let mut evaluator = Evaluator::new(self.proxy.decoder());
        Arc::clone(&self.proxy).setup(&mut evaluator);
        let installed = evaluator.installed();
        (self.sessions.open(evaluator), installed)
    }

    /// Opens `target` and binds it to the store. The proxy does not pick it
    /// up until it is re-initialized.
    ///
    /// The target is opened before the store lock is taken, so opening a
    /// database does not stall other sessions.
    pub fn attach_target(&self, target: &TargetConfig) -> Result<(), ApiError> {
        let opened = target.open()?;
        let mut store = self.store.write().unwrap();
        bind(&mut store, target, opened)
    }
}

fn attach(store: &mut AtomStore, target: &TargetConfig) -> Result<(), ApiError> {
    let opened = target.open()?;
    bind(store, target, opened)
}

fn bind(
    store: &mut AtomStore,
    target: &TargetConfig,
    opened: Arc<dyn StorageTarget>,
) -> Result<(), ApiError> {
    tracing::info!("attaching {} as {:?}", opened.describe(), target.name());
    store.attach_target(target.name(), opened)?;
    Ok(())
}
