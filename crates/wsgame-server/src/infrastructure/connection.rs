//! One accepted WebSocket: write half, outbound queue, lifecycle, scopes.
//!
//! # Ownership
//!
//! A [`Connection`] is owned by the [`ConnectionRegistry`] once registered.
//! The two session loops only keep a `Weak` handle; the broadcast bus and the
//! shutdown coordinator only see it through short-lived registry snapshots.
//! When the registry lets go and the last snapshot is dropped, the write half
//! goes with it.
//!
//! # Halves
//!
//! The socket is split on accept.  The write half ([`FrameSink`]) lives here
//! behind an async mutex because three parties may write to it: the send loop
//! (queued text and keepalive pings), the receive loop (acknowledging a peer
//! close) and the shutdown coordinator (starting a close handshake).  The read
//! half ([`FrameStream`]) is owned outright by the receive loop.
//!
//! # Scopes
//!
//! ```text
//! server root token
//!   └─ connection scope        cancels both loops
//!        └─ send scope         cancels only the send loop
//! ```
//!
//! [`ConnectionRegistry`]: crate::infrastructure::registry::ConnectionRegistry

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message as WsMessage,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wsgame_core::protocol::close::{REASON_ACKNOWLEDGE, REASON_CLOSING, REASON_DRAINING};
use wsgame_core::ConnectionId;

use crate::domain::ConnectionState;

/// Write half of a WebSocket, type-erased so tests can substitute a channel.
pub type FrameSink = Pin<Box<dyn Sink<WsMessage, Error = WsError> + Send>>;

/// Read half of a WebSocket, type-erased for the same reason.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WsMessage, WsError>> + Send>>;

/// Consumer end of a connection's outbound queue, owned by its send loop.
pub type OutboundQueue = mpsc::Receiver<String>;

/// Per-connection I/O failures.  Every one of these ends in teardown of that
/// connection only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The write half was already released during teardown.
    #[error("connection {0}: transport already released")]
    Released(ConnectionId),

    /// Transmitting a frame failed.
    #[error("connection {id}: send failed: {source}")]
    Send {
        id: ConnectionId,
        #[source]
        source: WsError,
    },

    /// The peer did not finish the close handshake in time.
    #[error("connection {id}: close handshake not completed within {timeout:?}")]
    CloseTimeout { id: ConnectionId, timeout: Duration },
}

/// Why a message could not be placed on an outbound queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity; the message was dropped.
    #[error("outbound queue full")]
    Full,
    /// The send loop is gone; nobody will ever read the queue.
    #[error("outbound queue closed")]
    Closed,
}

/// One accepted socket plus its outbound queue and lifecycle state.
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    sink: Mutex<Option<FrameSink>>,
    queue: mpsc::Sender<String>,
    state: watch::Sender<ConnectionState>,
    scope: CancellationToken,
    send_scope: CancellationToken,
    dropped: AtomicU64,
}

impl Connection {
    /// Creates a connection in the `Connecting` state.
    ///
    /// The connection scope is a child of `parent`, so cancelling the server's
    /// root token cancels this connection's loops too.  Returns the consumer
    /// end of the outbound queue, which belongs to the send loop.
    pub fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        sink: FrameSink,
        queue_capacity: usize,
        parent: &CancellationToken,
    ) -> (Self, OutboundQueue) {
        let (queue, queue_rx) = mpsc::channel(queue_capacity);
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let scope = parent.child_token();
        let send_scope = scope.child_token();
        let conn = Self {
            id,
            peer,
            sink: Mutex::new(Some(sink)),
            queue,
            state,
            scope,
            send_scope,
            dropped: AtomicU64::new(0),
        };
        (conn, queue_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Moves to `next` if the lifecycle allows it.  Returns whether it moved.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let id = self.id;
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                debug!(connection = %id, from = %current, to = %next, "state change");
                *current = next;
                true
            } else {
                false
            }
        })
    }

    // ── Outbound queue ────────────────────────────────────────────────────────

    /// Appends `message` to the outbound queue without waiting.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Full`] when the queue is at capacity (the message is
    /// dropped and counted), [`EnqueueError::Closed`] when the send loop has
    /// gone away.
    pub fn enqueue(&self, message: String) -> Result<(), EnqueueError> {
        match self.queue.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(EnqueueError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Messages currently waiting in the outbound queue.
    pub fn queue_len(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.max_capacity()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    /// Token covering both loops.
    pub fn scope(&self) -> CancellationToken {
        self.scope.clone()
    }

    /// Token covering only the send loop.
    pub fn send_scope(&self) -> CancellationToken {
        self.send_scope.clone()
    }

    pub fn cancel_send_loop(&self) {
        self.send_scope.cancel();
    }

    /// Cancels both loops.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    /// Sends one frame on the write half.
    ///
    /// # Errors
    ///
    /// [`SessionError::Released`] after [`release`](Self::release),
    /// [`SessionError::Send`] on a transport failure.
    pub async fn transmit(&self, message: WsMessage) -> Result<(), SessionError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(SessionError::Released(self.id))?;
        sink.send(message).await.map_err(|source| SessionError::Send {
            id: self.id,
            source,
        })
    }

    /// Starts (or joins) a close handshake and waits for it to finish.
    ///
    /// If the connection is `Open` this sends a Normal Closure frame and moves
    /// to `ClosingLocal`; the receive loop completes the handshake when the
    /// peer's reply arrives.  If the peer already started closing, this just
    /// waits for that to finish.  Returns the terminal state reached.
    ///
    /// # Errors
    ///
    /// [`SessionError::CloseTimeout`] if no terminal state is reached within
    /// `timeout`; the caller is expected to force an abort.
    pub async fn close(&self, timeout: Duration) -> Result<ConnectionState, SessionError> {
        let mut states = self.state.subscribe();
        let handshake = async {
            if self.transition(ConnectionState::ClosingLocal) {
                let frame = close_frame(CloseCode::Normal, REASON_CLOSING);
                if let Err(e) = self.transmit(WsMessage::Close(Some(frame))).await {
                    warn!(connection = %self.id, "close frame not sent: {e}");
                    self.transition(ConnectionState::Aborted);
                }
            }
            match states.wait_for(|s| s.is_terminal()).await {
                Ok(state) => *state,
                // The sender lives inside `self`, so this cannot be closed.
                Err(_) => ConnectionState::Aborted,
            }
        };
        tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| SessionError::CloseTimeout {
                id: self.id,
                timeout,
            })
    }

    /// Replies to a peer-initiated close frame.
    ///
    /// On a tungstenite socket the reply the peer sees is the library's own
    /// echo of the peer's frame, queued as the close was read.  The
    /// `REASON_ACKNOWLEDGE` frame sent here then never reaches the wire and
    /// comes back as `ConnectionClosed`, which counts as success.  Sinks
    /// without an automatic reply do carry this frame.
    pub async fn acknowledge_close(&self, timeout: Duration) -> Result<(), SessionError> {
        let frame = close_frame(CloseCode::Normal, REASON_ACKNOWLEDGE);
        match tokio::time::timeout(timeout, self.transmit(WsMessage::Close(Some(frame)))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(SessionError::Send {
                source: WsError::ConnectionClosed,
                ..
            })) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::CloseTimeout {
                id: self.id,
                timeout,
            }),
        }
    }

    /// Turns away a connection whose handshake finished after draining began.
    pub async fn reject_draining(&self, timeout: Duration) {
        let frame = close_frame(CloseCode::Away, REASON_DRAINING);
        let _ = tokio::time::timeout(timeout, self.transmit(WsMessage::Close(Some(frame)))).await;
        self.release().await;
    }

    /// Final teardown: marks the connection `Aborted` unless it closed cleanly,
    /// cancels both loops and drops the write half.  Safe to call repeatedly.
    pub async fn release(&self) {
        if self.state() != ConnectionState::Closed {
            self.transition(ConnectionState::Aborted);
        }
        self.scope.cancel();
        let sink = self.sink.lock().await.take();
        if sink.is_some() {
            debug!(connection = %self.id, state = %self.state(), "transport released");
        }
    }

    /// Whether [`release`](Self::release) has run.
    pub async fn is_released(&self) -> bool {
        self.sink.lock().await.is_none()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

fn close_frame(code: CloseCode, reason: &'static str) -> CloseFrame<'static> {
    CloseFrame {
        code,
        reason: reason.into(),
    }
}

// ── Test support ──────────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────────
