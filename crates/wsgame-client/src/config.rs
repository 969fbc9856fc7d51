//! Client configuration.

use std::time::Duration;

/// Default server endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `ws://` URL of the server.
    pub server_url: String,
    /// One queued line is transmitted per interval.
    pub send_interval: Duration,
    /// Upper bound on the close handshake when stopping.
    pub close_timeout: Duration,
    /// Received messages buffered for [`next_message`] before new ones are
    /// dropped.
    ///
    /// [`next_message`]: crate::ClientSession::next_message
    pub inbound_capacity: usize,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            send_interval: Duration::from_millis(100),
            close_timeout: Duration::from_secs(10),
            inbound_capacity: 256,
        }
    }
}
