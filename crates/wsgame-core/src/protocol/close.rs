//! Close-frame reason strings.
//!
//! The status codes themselves come from the WebSocket library (1000 Normal
//! Closure, 1001 Going Away); only the human-readable reasons are ours.

/// Reason sent when the server starts a close handshake during shutdown.
pub const REASON_CLOSING: &str = "Closing";

/// Reason sent when replying to a close frame the peer sent first.
pub const REASON_ACKNOWLEDGE: &str = "Acknowledge Close frame";

/// Reason sent to a connection whose handshake finished after draining began.
pub const REASON_DRAINING: &str = "Server draining";

/// Body of the HTTP response returned to upgrade requests while draining.
pub const UNAVAILABLE_BODY: &str = "server is shutting down";
