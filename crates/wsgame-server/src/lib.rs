//! wsgame-server library crate.
//!
//! A WebSocket connection manager for a small multiplayer game back end:
//! every text frame a client sends is broadcast to every connected client
//! (the sender included), except a few reserved command keywords that are
//! handed to pluggable collaborators instead.  Shutdown drains every
//! connection with a bounded close handshake.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Game clients (text over WebSocket)
//!         ↕
//! [wsgame-server]
//!   ├── domain/           Pure types: ServerConfig, ConnectionState
//!   ├── application/      Command dispatch: keyword → CommandHandler
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop and HTTP upgrade (tokio-tungstenite)
//!         ├── session/    Receive + send loop per connection
//!         ├── registry/   Live connections, draining flag
//!         ├── broadcast/  Fan-out to outbound queues
//!         └── shutdown/   Run-once bounded drain
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `wsgame-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: configuration and the connection state machine.
pub mod domain;

/// Application layer: reserved command routing.
pub mod application;

/// Infrastructure layer: sockets, tasks, registry, shutdown.
pub mod infrastructure;

pub use application::{CommandHandler, CommandRouter};
pub use domain::ServerConfig;
pub use infrastructure::{Server, ServerHandle, ShutdownReport};
