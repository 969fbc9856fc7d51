//! The set of live connections, keyed by id.
//!
//! The registry is the single owner of every registered [`Connection`].
//! Everyone else (the broadcast bus, the shutdown coordinator) works from
//! [`ConnectionRegistry::snapshot`], a consistent point-in-time copy that can
//! be iterated while connections come and go.
//!
//! Registration and the draining flag share one lock, so once
//! [`begin_drain`](ConnectionRegistry::begin_drain) returns no further
//! connection can get in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use wsgame_core::{ConnectionId, ConnectionIdAllocator};

use super::connection::Connection;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Shutdown has begun; new connections are refused.
    #[error("registry is draining; connection refused")]
    Draining,
}

#[derive(Default)]
struct RegistryInner {
    draining: bool,
    connections: BTreeMap<ConnectionId, Arc<Connection>>,
}

/// Concurrent map of live connections plus the id allocator.
#[derive(Default)]
pub struct ConnectionRegistry {
    ids: ConnectionIdAllocator,
    inner: RwLock<RegistryInner>,
    // Lock-free mirror of `inner.draining` for the synchronous handshake
    // callback.  `register` always re-checks under the lock.
    draining_hint: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next connection id.
    pub fn next_id(&self) -> ConnectionId {
        self.ids.next()
    }

    /// Inserts `conn` under its id.
    ///
    /// Returns `Ok(false)` without replacing anything if the id is already
    /// present; the caller keeps ownership of the duplicate.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Draining`] once shutdown has begun.
    pub async fn register(&self, conn: Arc<Connection>) -> Result<bool, RegistryError> {
        let id = conn.id();
        let mut inner = self.inner.write().await;
        if inner.draining {
            return Err(RegistryError::Draining);
        }
        if inner.connections.contains_key(&id) {
            warn!(connection = %id, "id already registered; keeping existing entry");
            return Ok(false);
        }
        inner.connections.insert(id, conn);
        debug!(connection = %id, live = inner.connections.len(), "registered");
        Ok(true)
    }

    /// Removes the entry for `id`, handing ownership back to the caller.
    /// `None` if it was already removed.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut inner = self.inner.write().await;
        let removed = inner.connections.remove(&id);
        if removed.is_some() {
            debug!(connection = %id, live = inner.connections.len(), "unregistered");
        }
        removed
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.read().await.connections.get(&id).cloned()
    }

    /// Every registered connection at this instant, in id order.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.inner.read().await.connections.values().cloned().collect()
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.inner.read().await.connections.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Refuses all further registrations.  Returns `true` for the call that
    /// actually flipped the flag.
    pub async fn begin_drain(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.draining {
            return false;
        }
        inner.draining = true;
        self.draining_hint.store(true, Ordering::SeqCst);
        info!(live = inner.connections.len(), "registry draining");
        true
    }

    pub async fn is_draining(&self) -> bool {
        self.inner.read().await.draining
    }

    /// Non-blocking draining check for contexts that cannot await.
    pub fn draining_hint(&self) -> bool {
        self.draining_hint.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("next_id", &self.ids.peek())
            .field("draining", &self.draining_hint())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
