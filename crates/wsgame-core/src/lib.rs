//! # wsgame-core
//!
//! Shared library for the wsgame WebSocket server and its console client.
//! It has zero dependencies on sockets, async runtimes, or the file system.
//!
//! # Architecture overview (for beginners)
//!
//! The wsgame server accepts WebSocket connections from players, gives each
//! one a stable integer identity, and fans every chat-style text message out
//! to all connected players.  Two text payloads are *reserved* and are handed
//! to game collaborators instead of being broadcast.
//!
//! This crate is the shared vocabulary both sides agree on:
//!
//! - **`domain`** – Identities and data records: the connection id and its
//!   allocator, plus the `Player` / `GiftEvent` records exchanged with the
//!   resource and gift collaborators.
//!
//! - **`protocol`** – What travels on the wire beyond plain text: the two
//!   reserved command keywords and the close-frame reason strings.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `wsgame_core::ConnectionId` instead of the full module path.
pub use domain::gift::GiftEvent;
pub use domain::identity::{ConnectionId, ConnectionIdAllocator};
pub use domain::player::{ParseResourceKindError, Player, PlayerId, ResourceKind};
pub use protocol::command::ReservedCommand;
