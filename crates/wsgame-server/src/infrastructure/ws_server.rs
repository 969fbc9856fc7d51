//! WebSocket accept endpoint.
//!
//! # Connection lifecycle
//!
//! ```text
//! TcpListener::accept()
//!   └─ spawn per TCP connection:
//!        ├─ HTTP upgrade (503 while draining)
//!        ├─ allocate id, split socket, build Connection
//!        ├─ register (1001 Going Away if draining began mid-handshake)
//!        ├─ Session::spawn → receive loop + send loop
//!        └─ await Session::finished (teardown done)
//! ```
//!
//! The accept loop runs until the root cancellation token fires, which the
//! [`ShutdownCoordinator`] does as the last step of a drain.  Until then,
//! upgrade requests are answered with `503 Service Unavailable`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request, Response},
    http::StatusCode,
    protocol::WebSocketConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wsgame_core::protocol::close::UNAVAILABLE_BODY;

use crate::application::CommandRouter;
use crate::domain::{ConnectionState, ServerConfig};

use super::broadcast::BroadcastBus;
use super::connection::Connection;
use super::registry::{ConnectionRegistry, RegistryError};
use super::session::{Session, SessionContext};
use super::shutdown::{ShutdownCoordinator, ShutdownReport};

/// Pause after a failed `accept` so a persistent error (fd exhaustion) does
/// not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A bound, not yet running, WebSocket server.
///
/// # Example
///
/// ```rust,no_run
/// use wsgame_server::application::CommandRouter;
/// use wsgame_server::domain::ServerConfig;
/// use wsgame_server::infrastructure::Server;
///
/// # async fn demo() -> anyhow::Result<()> {
/// let server = Server::bind(ServerConfig::default(), CommandRouter::with_reserved_defaults()).await?;
/// let handle = server.handle();
/// tokio::spawn(server.run());
/// // ... later
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    ctx: SessionContext,
    root: CancellationToken,
    handle: ServerHandle,
}

/// Cloneable control surface for a running [`Server`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    bus: BroadcastBus,
    coordinator: Arc<ShutdownCoordinator>,
}

impl ServerHandle {
    /// Address the server is actually listening on (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broadcast_bus(&self) -> &BroadcastBus {
        &self.bus
    }

    /// Drains every connection and stops the accept loop.  Safe to call any
    /// number of times; the drain runs once.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.coordinator.shutdown().await.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.coordinator.is_complete()
    }
}

impl Server {
    /// Validates `config` and binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address cannot
    /// be bound.
    pub async fn bind(config: ServerConfig, router: CommandRouter) -> anyhow::Result<Self> {
        config.validate().context("invalid server configuration")?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound address")?;

        let registry = Arc::new(ConnectionRegistry::new());
        let root = CancellationToken::new();
        let ctx = SessionContext::new(Arc::clone(&registry), Arc::new(router), &config);
        let coordinator = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&registry),
            root.clone(),
            config.close_timeout,
        ));
        let handle = ServerHandle {
            local_addr,
            registry,
            bus: ctx.bus.clone(),
            coordinator,
        };

        info!("WebSocket server listening on ws://{local_addr}");
        Ok(Self {
            listener,
            config,
            ctx,
            root,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Accepts connections until shutdown completes.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and the loop
    /// keeps going.
    pub async fn run(self) -> anyhow::Result<()> {
        let Server {
            listener,
            config,
            ctx,
            root,
            ..
        } = self;
        let ws_config = websocket_config(&config);

        loop {
            tokio::select! {
                biased;
                _ = root.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let ctx = ctx.clone();
                        let root = root.clone();
                        let queue_capacity = config.queue_capacity;
                        tokio::spawn(async move {
                            if let Err(e) =
                                serve_connection(stream, peer, ctx, root, ws_config, queue_capacity).await
                            {
                                warn!(%peer, "{e:#}");
                            }
                        });
                    }
                    Err(e) => {
                        error!("accept failed: {e}");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        info!("accept loop stopped");
        Ok(())
    }
}

fn websocket_config(config: &ServerConfig) -> WebSocketConfig {
    let mut ws = WebSocketConfig::default();
    ws.max_message_size = Some(config.max_message_size);
    ws.max_frame_size = Some(config.max_message_size);
    ws
}

fn unavailable() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(UNAVAILABLE_BODY.to_string()));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
}

/// Runs one TCP connection from upgrade to teardown.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: SessionContext,
    root: CancellationToken,
    ws_config: WebSocketConfig,
    queue_capacity: usize,
) -> anyhow::Result<()> {
    let registry = Arc::clone(&ctx.registry);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if registry.draining_hint() {
            debug!(%peer, "upgrade refused while draining");
            return Err(unavailable());
        }
        debug!(%peer, path = %request.uri().path(), "upgrade request");
        Ok(response)
    };

    let ws = accept_hdr_async_with_config(stream, callback, Some(ws_config))
        .await
        .with_context(|| format!("WebSocket handshake with {peer} failed"))?;

    let id = ctx.registry.next_id();
    let (sink, stream) = ws.split();
    let (conn, queue) = Connection::new(id, Some(peer), Box::pin(sink), queue_capacity, &root);
    let conn = Arc::new(conn);
    conn.transition(ConnectionState::Open);

    let registered = match ctx.registry.register(Arc::clone(&conn)).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(connection = %id, %peer, "id collision; serving without registry entry");
            false
        }
        Err(RegistryError::Draining) => {
            info!(connection = %id, %peer, "handshake finished after drain began; turning away");
            conn.reject_draining(ctx.close_timeout).await;
            return Ok(());
        }
    };
    info!(connection = %id, %peer, "connection opened");

    let session = Session::spawn(ctx, &conn, queue, Box::pin(stream), registered);
    // A registered connection belongs to the registry from here on.  An
    // unregistered duplicate has no other owner, so it lives on this task.
    let keep_alive = if registered {
        drop(conn);
        None
    } else {
        Some(conn)
    };

    let exit = session.finished().await;
    drop(keep_alive);
    debug!(connection = %id, ?exit, "session finished");
    Ok(())
}
