//! Reserved in-band commands.
//!
//! Any text frame whose *entire* payload equals one of these keywords is not
//! broadcast; the server hands it to the collaborator registered for that
//! keyword instead.  Matching is exact and case-sensitive: `"sendgifts "`
//! (trailing space) or `"SendGifts"` are ordinary chat messages.

use std::fmt;

/// One of the two reserved command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedCommand {
    /// `updateresource` – routed to the resource-update collaborator.
    UpdateResource,
    /// `sendgifts` – routed to the gift-transfer collaborator.
    SendGifts,
}

impl ReservedCommand {
    /// Every reserved command, in a stable order.
    pub const ALL: [ReservedCommand; 2] =
        [ReservedCommand::UpdateResource, ReservedCommand::SendGifts];

    /// Returns the command whose keyword equals `payload`, if any.
    pub fn parse(payload: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.keyword() == payload)
    }

    /// The exact text that triggers this command.
    pub const fn keyword(self) -> &'static str {
        match self {
            ReservedCommand::UpdateResource => "updateresource",
            ReservedCommand::SendGifts => "sendgifts",
        }
    }
}

impl fmt::Display for ReservedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
