//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from CLI arguments (see `main.rs`) or from
//! [`ServerConfig::default`], then shared behind an `Arc`.
//!
//! The core never computes these values; it only reads them.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A timing knob was zero, which would either spin or never wait.
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    /// The outbound queue must hold at least one message.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    /// Frames larger than this are refused by the WebSocket layer.
    #[error("max message size must be at least 1 byte")]
    ZeroMessageSize,
}

/// All runtime configuration for the WebSocket server.
///
/// # Example
///
/// ```rust
/// use wsgame_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the accept endpoint binds to.
    pub bind_addr: SocketAddr,

    /// How often an idle `Open` connection is sent a WebSocket Ping.
    pub keepalive_interval: Duration,

    /// Upper bound on any close handshake: the shutdown coordinator's
    /// per-connection close attempt and a connection acknowledging a
    /// peer-initiated close both give up after this long.
    pub close_timeout: Duration,

    /// Cadence of the per-connection send loop.  Exactly one queued message
    /// is transmitted per tick, so this is also the per-connection rate limit.
    pub send_interval: Duration,

    /// Bound on each connection's outbound queue.  Broadcasts arriving at a
    /// full queue are dropped (newest first) and logged.
    pub queue_capacity: usize,

    /// Largest inbound message the WebSocket layer will accept.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// Checks that every knob is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("keepalive interval", self.keepalive_interval),
            ("close timeout", self.close_timeout),
            ("send interval", self.send_interval),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroMessageSize);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    /// | Field              | Default            |
    /// |--------------------|--------------------|
    /// | bind_addr          | `127.0.0.1:8080`   |
    /// | keepalive_interval | 120 seconds        |
    /// | close_timeout      | 2500 milliseconds  |
    /// | send_interval      | 250 milliseconds   |
    /// | queue_capacity     | 1024 messages      |
    /// | max_message_size   | 64 KiB             |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            keepalive_interval: Duration::from_secs(120),
            close_timeout: Duration::from_millis(2500),
            send_interval: Duration::from_millis(250),
            queue_capacity: 1024,
            max_message_size: 64 * 1024,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_localhost_8080() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_default_timings_match_documented_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.keepalive_interval, Duration::from_secs(120));
        assert_eq!(cfg.close_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.send_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ServerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero_send_interval() {
        // Arrange
        let cfg = ServerConfig {
            send_interval: Duration::ZERO,
            ..ServerConfig::default()
        };

        // Act
        let result = cfg.validate();

        // Assert
        assert_eq!(
            result,
            Err(ConfigError::ZeroDuration {
                field: "send interval"
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_close_timeout() {
        let cfg = ServerConfig {
            close_timeout: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ZeroDuration { field: "close timeout" })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_queue_capacity() {
        let cfg = ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn test_validate_rejects_zero_message_size() {
        let cfg = ServerConfig {
            max_message_size: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroMessageSize));
    }
}
