//! Client directory: one connection manager per endpoint.
//!
//! The directory is an ordinary value. Clone it to share it; create separate
//! directories for isolated clients or tests.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, Shared};
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::listener::{AuthTokenProvider, SessionListener};
use crate::transport::{Connector, WebSocketConnector};

struct DirectoryInner {
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthTokenProvider>,
    config: ClientConfig,
    connections: Mutex<HashMap<Endpoint, Arc<ConnectionManager>>>,
}

/// Deduplicates connection managers by endpoint.
#[derive(Clone)]
pub struct ClientDirectory {
    inner: Arc<DirectoryInner>,
}

impl ClientDirectory {
    /// Directory whose managers open transports through `connector`.
    pub fn new(
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthTokenProvider>,
        config: ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                connector,
                auth,
                config,
                connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Directory over the default WebSocket transport.
    pub fn websocket(auth: Arc<dyn AuthTokenProvider>, config: ClientConfig) -> Self {
        let connector = Arc::new(WebSocketConnector::new(config.max_message_size));
        Self::new(connector, auth, config)
    }

    /// Configuration handed to every manager.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The manager for `address`, created and started on first use.
    ///
    /// `listener` is attached either way. Must be called inside a Tokio runtime.
    pub fn connect(
        &self,
        address: &str,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<Arc<ConnectionManager>> {
        let endpoint = Endpoint::parse(address, &self.inner.config.default_scheme)?;
        let manager = {
            let mut connections = self.inner.connections.lock();
            // A closed manager keeps its entry until its driver stops.
            let live = connections
                .get(&endpoint)
                .filter(|existing| !existing.is_closed());
            if let Some(existing) = live {
                debug!(%endpoint, "reusing connection manager");
                Arc::clone(existing)
            } else {
                let link = DirectoryLink {
                    directory: Arc::downgrade(&self.inner),
                    endpoint: endpoint.clone(),
                };
                let manager = ConnectionManager::spawn(
                    endpoint.clone(),
                    Arc::clone(&self.inner.connector),
                    Arc::clone(&self.inner.auth),
                    self.inner.config.clone(),
                    Some(link),
                );
                let _ = connections.insert(endpoint, Arc::clone(&manager));
                manager
            }
        };
        if let Some(listener) = listener {
            manager.add_session_listener(listener);
        }
        Ok(manager)
    }

    /// The live manager for `address`, if any.
    pub fn get(&self, address: &str) -> Option<Arc<ConnectionManager>> {
        let endpoint = Endpoint::parse(address, &self.inner.config.default_scheme).ok()?;
        self.inner
            .connections
            .lock()
            .get(&endpoint)
            .filter(|manager| !manager.is_closed())
            .cloned()
    }

    /// Endpoints with a live manager, sorted.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.inner.connections.lock().keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    /// Number of live managers.
    pub fn len(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Whether no manager is live.
    pub fn is_empty(&self) -> bool {
        self.inner.connections.lock().is_empty()
    }

    /// Close every manager. Each leaves the directory once its driver stops.
    pub fn close_all(&self) {
        let managers: Vec<Arc<ConnectionManager>> =
            self.inner.connections.lock().values().cloned().collect();
        for manager in managers {
            manager.close();
        }
    }
}

impl std::fmt::Debug for ClientDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDirectory")
            .field("endpoints", &self.endpoints())
            .finish_non_exhaustive()
    }
}

/// Lets a manager's driver remove its own directory entry when it stops.
pub(crate) struct DirectoryLink {
    directory: Weak<DirectoryInner>,
    endpoint: Endpoint,
}

impl DirectoryLink {
    /// Remove the entry for this endpoint if it still points at `shared`.
    pub fn release(&self, shared: &Arc<Shared>) {
        let Some(directory) = self.directory.upgrade() else {
            return;
        };
        let removed = {
            let mut connections = directory.connections.lock();
            let owned = connections
                .get(&self.endpoint)
                .is_some_and(|manager| Arc::ptr_eq(manager.shared(), shared));
            if owned {
                connections.remove(&self.endpoint)
            } else {
                None
            }
        };
        if removed.is_some() {
            debug!(endpoint = %self.endpoint, "connection manager left directory");
        }
    }
}
