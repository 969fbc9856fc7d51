//! Player record and resource kinds.
//!
//! These types are the data contract between the WebSocket core and the
//! resource-update / gift-transfer collaborators.  The core never changes a
//! balance itself; it only carries these records to whoever is wired in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a player in the key/value store.
///
/// Player ids are opaque strings chosen by the store, unrelated to the
/// integer [`ConnectionId`](crate::ConnectionId) of a socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A player as stored by the resource collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub coins: i64,
    pub rolls: i64,
    pub is_online: bool,
}

impl Player {
    /// Creates an offline player with empty balances.
    pub fn new(id: impl Into<PlayerId>) -> Self {
        Self {
            id: id.into(),
            coins: 0,
            rolls: 0,
            is_online: false,
        }
    }

    /// Returns the counter for `kind`.
    pub fn balance(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Coins => self.coins,
            ResourceKind::Rolls => self.rolls,
        }
    }
}

/// The two numeric resources a player holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Coins,
    Rolls,
}

impl ResourceKind {
    /// Wire spelling used in query strings and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Coins => "coins",
            ResourceKind::Rolls => "rolls",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a resource name is neither `coins` nor `rolls`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource type: {0:?}")]
pub struct ParseResourceKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coins" => Ok(ResourceKind::Coins),
            "rolls" => Ok(ResourceKind::Rolls),
            other => Err(ParseResourceKindError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_parses_known_names() {
        assert_eq!("coins".parse::<ResourceKind>(), Ok(ResourceKind::Coins));
        assert_eq!("rolls".parse::<ResourceKind>(), Ok(ResourceKind::Rolls));
    }

    #[test]
    fn test_resource_kind_rejects_unknown_and_miscased_names() {
        assert!("gems".parse::<ResourceKind>().is_err());
        assert!("Coins".parse::<ResourceKind>().is_err());
        assert!("".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_parse_error_names_the_offending_value() {
        let err = "gems".parse::<ResourceKind>().unwrap_err();
        assert_eq!(err.to_string(), "invalid resource type: \"gems\"");
    }

    #[test]
    fn test_new_player_is_offline_with_empty_balances() {
        let player = Player::new("p-1");
        assert_eq!(player.id, PlayerId::from("p-1"));
        assert_eq!(player.balance(ResourceKind::Coins), 0);
        assert_eq!(player.balance(ResourceKind::Rolls), 0);
        assert!(!player.is_online);
    }

    #[test]
    fn test_player_serializes_with_camel_case_fields() {
        // Arrange
        let player = Player {
            id: PlayerId::from("alice"),
            coins: 10,
            rolls: 3,
            is_online: true,
        };

        // Act
        let value = serde_json::to_value(&player).unwrap();

        // Assert
        assert_eq!(
            value,
            serde_json::json!({"id": "alice", "coins": 10, "rolls": 3, "isOnline": true})
        );
    }
}
