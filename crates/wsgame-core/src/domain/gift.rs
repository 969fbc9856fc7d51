//! Gift notification record.

use serde::{Deserialize, Serialize};

use super::player::{PlayerId, ResourceKind};

/// A pending notification that one player sent resources to another.
///
/// Produced by the gift-transfer collaborator when the recipient is online;
/// delivering it to the recipient's socket is the collaborator's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftEvent {
    pub from_player_id: PlayerId,
    pub to_player_id: PlayerId,
    #[serde(rename = "resourceType")]
    pub resource: ResourceKind,
    #[serde(rename = "resourceValue")]
    pub amount: i64,
}
