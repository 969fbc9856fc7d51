//! Domain entities for wsgame.
//!
//! Pure data types with no infrastructure dependencies.  Code in the server
//! and client crates depends on these types; they never depend back.

/// Connection identities and the process-wide id allocator.
pub mod identity;

/// Player record exchanged with the resource collaborator.
pub mod player;

/// Pending cross-player gift notification.
pub mod gift;
