//! Connection lifecycle state machine.
//!
//! ```text
//!                    ┌──► ClosingLocal  ──┐
//! Connecting ──► Open                     ├──► Closed
//!                    └──► ClosingRemote ──┘
//!
//! any non-terminal state ──► Aborted   (I/O error or timeout)
//! ```
//!
//! - `ClosingLocal`: the server sent the first close frame (shutdown).
//! - `ClosingRemote`: the peer sent the first close frame.
//! - `Closed` and `Aborted` are terminal; nothing leaves them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake finished, not yet registered.
    Connecting,
    /// Registered and exchanging frames.
    Open,
    /// We sent a close frame and are waiting for the peer's reply.
    ClosingLocal,
    /// The peer sent a close frame and we are acknowledging it.
    ClosingRemote,
    /// Close handshake completed cleanly.
    Closed,
    /// Torn down without a completed handshake.
    Aborted,
}

impl ConnectionState {
    /// `true` for `Closed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Aborted)
    }

    /// Only an `Open` connection may transmit queued messages.
    pub fn can_transmit(self) -> bool {
        self == ConnectionState::Open
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed | Aborted, _) => false,
            (_, Aborted) => true,
            (Connecting, Open) => true,
            (Open, ClosingLocal | ClosingRemote) => true,
            (ClosingLocal | ClosingRemote, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::ClosingLocal => "ClosingLocal",
            ConnectionState::ClosingRemote => "ClosingRemote",
            ConnectionState::Closed => "Closed",
            ConnectionState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}
