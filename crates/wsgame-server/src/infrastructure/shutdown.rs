//! Graceful, bounded, run-once shutdown.
//!
//! # Sequence
//!
//! 1. Flip the registry to draining; no connection can register after this.
//! 2. Snapshot the registry.
//! 3. For every connection in the snapshot, concurrently:
//!    stop its send loop, attempt a close handshake bounded by the close
//!    timeout, force an abort if that fails, then remove it from the
//!    registry.
//! 4. Cancel the server's root token.  This stops the accept loop and any
//!    session that was never registered.
//! 5. Release every connection removed in step 3.
//!
//! Close attempts run side by side, so one silent peer costs at most one
//! close timeout for the whole drain, not one per connection.
//!
//! Calling [`ShutdownCoordinator::shutdown`] again, or from several tasks at
//! once, runs the sequence exactly once; every caller gets the same report.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wsgame_core::ConnectionId;

use crate::domain::ConnectionState;

use super::connection::Connection;
use super::registry::ConnectionRegistry;

/// What the drain did to each connection it found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Completed the close handshake.
    pub closed: Vec<ConnectionId>,
    /// Timed out, failed, or were already gone; torn down without a handshake.
    pub aborted: Vec<ConnectionId>,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.closed.len() + self.aborted.len()
    }
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    registry: Arc<ConnectionRegistry>,
    root: CancellationToken,
    close_timeout: Duration,
    report: OnceCell<ShutdownReport>,
}

impl ShutdownCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        root: CancellationToken,
        close_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            root,
            close_timeout,
            report: OnceCell::new(),
        }
    }

    /// Drains every connection and cancels the root scope.  Idempotent.
    pub async fn shutdown(&self) -> &ShutdownReport {
        self.report.get_or_init(|| self.drain()).await
    }

    /// Whether a shutdown has finished.
    pub fn is_complete(&self) -> bool {
        self.report.initialized()
    }

    async fn drain(&self) -> ShutdownReport {
        self.registry.begin_drain().await;
        let snapshot = self.registry.snapshot().await;
        info!(
            connections = snapshot.len(),
            close_timeout = ?self.close_timeout,
            "shutdown: closing connections"
        );

        let outcomes = join_all(snapshot.into_iter().map(|conn| self.close_one(conn))).await;

        let mut report = ShutdownReport::default();
        let mut dispose = Vec::with_capacity(outcomes.len());
        for (id, closed, owned) in outcomes {
            if closed {
                report.closed.push(id);
            } else {
                report.aborted.push(id);
            }
            dispose.extend(owned);
        }

        self.root.cancel();
        for conn in &dispose {
            conn.release().await;
        }
        drop(dispose);

        info!(
            closed = report.closed.len(),
            aborted = report.aborted.len(),
            "shutdown complete"
        );
        report
    }

    async fn close_one(&self, conn: Arc<Connection>) -> (ConnectionId, bool, Option<Arc<Connection>>) {
        let id = conn.id();
        conn.cancel_send_loop();

        let closed = match conn.close(self.close_timeout).await {
            Ok(ConnectionState::Closed) => true,
            Ok(state) => {
                warn!(connection = %id, %state, "close handshake did not complete");
                false
            }
            Err(e) => {
                warn!(connection = %id, "{e}; forcing abort");
                false
            }
        };
        if !closed {
            conn.transition(ConnectionState::Aborted);
            conn.cancel();
        }

        let owned = self.registry.unregister(id).await;
        (id, closed, owned)
    }
}
