//! Domain layer for wsgame-server.
//!
//! Pure types with no dependencies on I/O, networking, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - The connection lifecycle state machine
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Environment variable or CLI reading (that is `main.rs`)

pub mod config;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use state::ConnectionState;
