//! wsgame WebSocket server: entry point.
//!
//! Accepts WebSocket connections from game clients and rebroadcasts every
//! text frame to every connected client.  The reserved keywords
//! `updateresource` and `sendgifts` are handed to command handlers instead.
//!
//! # Usage
//!
//! ```text
//! wsgame-server [OPTIONS]
//!
//! Options:
//!   --bind              <IP>     Listen address [default: 127.0.0.1]
//!   --port              <PORT>   Listen port [default: 8080]
//!   --keepalive-secs    <SECS>   Ping interval [default: 120]
//!   --close-timeout-ms  <MS>     Close handshake bound [default: 2500]
//!   --send-interval-ms  <MS>     Per-connection send cadence [default: 250]
//!   --queue-capacity    <N>      Outbound queue bound [default: 1024]
//!   --max-message-size  <BYTES>  Largest inbound message [default: 65536]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                   | Default     |
//! |----------------------------|-------------|
//! | `WSGAME_BIND`              | `127.0.0.1` |
//! | `WSGAME_PORT`              | `8080`      |
//! | `WSGAME_KEEPALIVE_SECS`    | `120`       |
//! | `WSGAME_CLOSE_TIMEOUT_MS`  | `2500`      |
//! | `WSGAME_SEND_INTERVAL_MS`  | `250`       |
//! | `WSGAME_QUEUE_CAPACITY`    | `1024`      |
//! | `WSGAME_MAX_MESSAGE_SIZE`  | `65536`     |
//!
//! # Shutdown
//!
//! Ctrl+C (and SIGTERM on Unix) starts a graceful drain: new upgrades get
//! `503`, every open connection gets a close handshake bounded by the close
//! timeout, then the process exits.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsgame_server::application::CommandRouter;
use wsgame_server::domain::ServerConfig;
use wsgame_server::infrastructure::{Server, ServerHandle};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// wsgame WebSocket server.
#[derive(Debug, Parser)]
#[command(
    name = "wsgame-server",
    about = "Broadcasting WebSocket server with graceful, bounded shutdown",
    version
)]
struct Cli {
    /// IP address to bind to.  `0.0.0.0` accepts connections on every
    /// interface.
    #[arg(long, default_value = "127.0.0.1", env = "WSGAME_BIND")]
    bind: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 8080, env = "WSGAME_PORT")]
    port: u16,

    /// Seconds between keepalive pings on an idle connection.
    #[arg(long, default_value_t = 120, env = "WSGAME_KEEPALIVE_SECS")]
    keepalive_secs: u64,

    /// Milliseconds to wait for a close handshake before aborting.
    #[arg(long, default_value_t = 2500, env = "WSGAME_CLOSE_TIMEOUT_MS")]
    close_timeout_ms: u64,

    /// Milliseconds between queued messages on one connection.
    #[arg(long, default_value_t = 250, env = "WSGAME_SEND_INTERVAL_MS")]
    send_interval_ms: u64,

    /// Outbound messages buffered per connection before new ones are dropped.
    #[arg(long, default_value_t = 1024, env = "WSGAME_QUEUE_CAPACITY")]
    queue_capacity: usize,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, default_value_t = 64 * 1024, env = "WSGAME_MAX_MESSAGE_SIZE")]
    max_message_size: usize,
}

impl Cli {
    /// Converts the parsed CLI arguments into a validated [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address or any knob is zero.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        let config = ServerConfig {
            bind_addr,
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            send_interval: Duration::from_millis(self.send_interval_ms),
            queue_capacity: self.queue_capacity,
            max_message_size: self.max_message_size,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Signals ───────────────────────────────────────────────────────────────────

/// Resolves on the first Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C; draining"),
        _ = terminate => info!("received SIGTERM; draining"),
    }
}

async fn drain_on_signal(handle: ServerHandle) {
    shutdown_signal().await;
    let report = handle.shutdown().await;
    info!(
        closed = report.closed.len(),
        aborted = report.aborted.len(),
        "drain finished"
    );
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;
    info!(
        bind = %config.bind_addr,
        close_timeout = ?config.close_timeout,
        send_interval = ?config.send_interval,
        "wsgame server starting"
    );

    let server = Server::bind(config, CommandRouter::with_reserved_defaults()).await?;
    tokio::spawn(drain_on_signal(server.handle()));

    server.run().await?;

    info!("wsgame server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
