//! Application layer for wsgame-server.
//!
//! The application layer decides *what* happens to an inbound payload; the
//! infrastructure layer decides *how* bytes move.
//!
//! # Responsibilities
//!
//! - Recognising reserved command keywords and routing them to the
//!   collaborator registered for each one (`dispatch`)
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or spawning tasks (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod dispatch;

pub use dispatch::{
    CommandError, CommandHandler, CommandInvocation, CommandRouter, UnwiredCommandHandler,
};
