//! Fan-out of one message to every registered connection's outbound queue.
//!
//! Broadcasting never waits on a socket: each delivery is a non-blocking
//! enqueue, and a full queue drops the new message for that connection only.
//! The per-connection send loops do the actual writing.

use std::sync::Arc;

use tracing::{debug, warn};
use wsgame_core::ConnectionId;

use super::connection::EnqueueError;
use super::registry::ConnectionRegistry;

/// Outcome of one [`BroadcastBus::broadcast`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Connections whose queue was full; the message was dropped for them.
    pub overflowed: Vec<ConnectionId>,
    /// Connections whose send loop had already exited.
    pub closed: Vec<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct BroadcastBus {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastBus {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Queues `message` for every connection registered right now, the
    /// sender included.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for conn in self.registry.snapshot().await {
            match conn.enqueue(message.to_owned()) {
                Ok(()) => report.delivered += 1,
                Err(EnqueueError::Full) => {
                    warn!(
                        connection = %conn.id(),
                        capacity = conn.queue_capacity(),
                        dropped_total = conn.dropped_count(),
                        "outbound queue full; dropping message"
                    );
                    report.overflowed.push(conn.id());
                }
                Err(EnqueueError::Closed) => {
                    debug!(connection = %conn.id(), "send loop gone; skipping");
                    report.closed.push(conn.id());
                }
            }
        }
        report
    }
}
