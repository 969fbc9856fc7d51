//! Per-connection receive and send loops.
//!
//! Each accepted connection runs two tasks:
//!
//! ```text
//!   socket read half ──► receive loop ──► CommandRouter / BroadcastBus
//!                                              │
//!                                              ▼
//!   socket write half ◄── send loop ◄── outbound queue
//! ```
//!
//! The receive loop owns teardown.  Whatever makes it stop (peer close, read
//! error, end of stream, cancellation) it cancels the connection scope,
//! removes the connection from the registry and releases the transport.  The
//! send loop never tears anything down itself; on a write failure it marks
//! the connection aborted and cancels the scope, which brings the receive
//! loop round to teardown.
//!
//! Both loops hold only a `Weak` handle to the [`Connection`], so once the
//! registry lets go (during shutdown, say) they find nothing to upgrade and
//! stop.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{
    protocol::CloseFrame, Error as WsError, Message as WsMessage,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wsgame_core::ConnectionId;

use crate::application::CommandRouter;
use crate::domain::{ConnectionState, ServerConfig};

use super::broadcast::BroadcastBus;
use super::connection::{Connection, FrameStream, OutboundQueue};
use super::registry::ConnectionRegistry;

/// Everything a session needs besides its own connection.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub registry: Arc<ConnectionRegistry>,
    pub bus: BroadcastBus,
    pub router: Arc<CommandRouter>,
    pub send_interval: Duration,
    pub keepalive_interval: Duration,
    pub close_timeout: Duration,
}

impl SessionContext {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        router: Arc<CommandRouter>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            bus: BroadcastBus::new(Arc::clone(&registry)),
            registry,
            router,
            send_interval: config.send_interval,
            keepalive_interval: config.keepalive_interval,
            close_timeout: config.close_timeout,
        }
    }
}

/// Why a receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    /// The peer sent the first close frame and we acknowledged it.
    PeerClosed,
    /// The peer answered our close frame.
    LocalClosed,
    /// The stream ended without a close handshake.
    StreamEnded,
    /// The connection scope was cancelled, or the connection was released.
    Cancelled,
    /// A read error.
    Fault,
}

/// Handles to the two tasks of one connection.
#[derive(Debug)]
pub struct Session {
    receive: JoinHandle<ReceiveExit>,
    send: JoinHandle<()>,
}

impl Session {
    /// Starts both loops for `conn`.
    ///
    /// `registered` says whether `conn` is the registry's entry for its id;
    /// if not, teardown leaves the registry alone.
    pub fn spawn(
        ctx: SessionContext,
        conn: &Arc<Connection>,
        queue: OutboundQueue,
        stream: FrameStream,
        registered: bool,
    ) -> Self {
        let id = conn.id();
        let weak = Arc::downgrade(conn);
        let send = tokio::spawn(send_loop(
            id,
            weak.clone(),
            queue,
            conn.send_scope(),
            ctx.send_interval,
            ctx.keepalive_interval,
        ));
        let scope = conn.scope();
        let receive = tokio::spawn(receive_loop(ctx, id, weak, stream, scope, registered));
        Self { receive, send }
    }

    /// Waits for teardown to finish.  This is the connection's completion
    /// signal.
    pub async fn finished(self) -> ReceiveExit {
        let exit = match self.receive.await {
            Ok(exit) => exit,
            Err(e) => {
                error!("receive loop panicked: {e}");
                ReceiveExit::Fault
            }
        };
        if let Err(e) = self.send.await {
            error!("send loop panicked: {e}");
        }
        exit
    }
}

// ── Receive loop ──────────────────────────────────────────────────────────────

/// Reads frames until the connection closes, then tears it down.
pub async fn receive_loop(
    ctx: SessionContext,
    id: ConnectionId,
    conn: Weak<Connection>,
    mut stream: FrameStream,
    scope: CancellationToken,
    registered: bool,
) -> ReceiveExit {
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = scope.cancelled() => break ReceiveExit::Cancelled,
            next = stream.next() => next,
        };
        let Some(conn) = conn.upgrade() else {
            break ReceiveExit::Cancelled;
        };
        let payload = match next {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection = %id, "binary frame is not UTF-8, ignored: {e}");
                    continue;
                }
            },
            Some(Ok(WsMessage::Close(frame))) => break on_close(&ctx, &conn, frame).await,
            // Pings are answered by the WebSocket layer.
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                debug!(connection = %id, state = %conn.state(), "stream ended");
                break ReceiveExit::StreamEnded;
            }
            Some(Err(e)) => {
                warn!(connection = %id, "receive failed: {e}");
                break ReceiveExit::Fault;
            }
        };
        // A command handler may never return; cancellation still wins.
        tokio::select! {
            biased;
            _ = scope.cancelled() => break ReceiveExit::Cancelled,
            () = on_payload(&ctx, &conn, &payload) => {}
        }
    };

    drop(stream);
    teardown(&ctx, id, &conn, &scope, registered).await;
    exit
}

async fn on_payload(ctx: &SessionContext, conn: &Connection, payload: &str) {
    if conn.state() != ConnectionState::Open {
        debug!(connection = %conn.id(), state = %conn.state(), "payload ignored while closing");
        return;
    }
    match ctx.router.invoke(conn.id(), payload).await {
        Some(Ok(())) => debug!(connection = %conn.id(), keyword = payload, "command handled"),
        Some(Err(e)) => warn!(connection = %conn.id(), "command failed: {e}"),
        None => {
            let report = ctx.bus.broadcast(payload).await;
            debug!(
                connection = %conn.id(),
                delivered = report.delivered,
                overflowed = report.overflowed.len(),
                "broadcast"
            );
        }
    }
}

async fn on_close(
    ctx: &SessionContext,
    conn: &Connection,
    frame: Option<CloseFrame<'static>>,
) -> ReceiveExit {
    let (code, reason) = frame
        .map(|f| (u16::from(f.code), f.reason.into_owned()))
        .unwrap_or((1005, String::new()));

    if conn.state() == ConnectionState::ClosingLocal {
        conn.transition(ConnectionState::Closed);
        info!(connection = %conn.id(), code, reason = %reason, "close handshake completed");
        return ReceiveExit::LocalClosed;
    }

    info!(connection = %conn.id(), code, reason = %reason, "peer requested close");
    conn.transition(ConnectionState::ClosingRemote);
    conn.cancel_send_loop();
    match conn.acknowledge_close(ctx.close_timeout).await {
        Ok(()) => {
            conn.transition(ConnectionState::Closed);
        }
        Err(e) => {
            warn!(connection = %conn.id(), "close acknowledgement failed: {e}");
            conn.transition(ConnectionState::Aborted);
        }
    }
    ReceiveExit::PeerClosed
}

async fn teardown(
    ctx: &SessionContext,
    id: ConnectionId,
    conn: &Weak<Connection>,
    scope: &CancellationToken,
    registered: bool,
) {
    // Stops the send loop before anything else.
    scope.cancel();

    let owned = if registered {
        ctx.registry.unregister(id).await
    } else {
        conn.upgrade()
    };
    if let Some(conn) = owned {
        conn.release().await;
        info!(connection = %id, peer = ?conn.peer(), state = %conn.state(), "connection closed");
    } else {
        debug!(connection = %id, "already released by shutdown");
    }
}

// ── Send loop ─────────────────────────────────────────────────────────────────

enum Tick {
    Send,
    Keepalive,
}

/// Drains the outbound queue at one message per `send_interval`, and pings
/// the peer every `keepalive_interval`.  Sends only while the connection is
/// `Open`.
pub async fn send_loop(
    id: ConnectionId,
    conn: Weak<Connection>,
    mut queue: OutboundQueue,
    scope: CancellationToken,
    send_interval: Duration,
    keepalive_interval: Duration,
) {
    let start = Instant::now();
    let mut pacing = interval_at(start + send_interval, send_interval);
    pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut keepalive = interval_at(start + keepalive_interval, keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let tick = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            _ = pacing.tick() => Tick::Send,
            _ = keepalive.tick() => Tick::Keepalive,
        };
        let Some(conn) = conn.upgrade() else { break };
        if !conn.state().can_transmit() {
            continue;
        }
        let frame = match tick {
            Tick::Send => match queue.try_recv() {
                Ok(text) => WsMessage::Text(text),
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => break,
            },
            Tick::Keepalive => WsMessage::Ping(Vec::new()),
        };

        let outcome = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            outcome = conn.transmit(frame) => outcome,
        };
        if let Err(e) = outcome {
            warn!(connection = %id, "{e}; aborting connection");
            conn.transition(ConnectionState::Aborted);
            conn.cancel();
            break;
        }
    }
    debug!(connection = %id, "send loop stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
