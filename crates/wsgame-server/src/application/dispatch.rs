//! Command dispatch: the pluggable hand-off point for reserved keywords.
//!
//! A text frame whose whole payload equals a registered keyword is handed to
//! that keyword's [`CommandHandler`] instead of being broadcast.  The server
//! does not interpret the keyword any further; what a handler does (touch the
//! player store, queue a gift notification, ...) is up to the collaborator
//! that is wired in.
//!
//! ```text
//! receive loop ──► CommandRouter::invoke(sender, payload)
//!                     │ registered keyword?   ──► handler.handle(invocation)
//!                     └ no                    ──► None  (caller broadcasts)
//! ```
//!
//! Out of the box, [`CommandRouter::with_reserved_defaults`] registers the two
//! reserved keywords to [`UnwiredCommandHandler`], which only logs the hand-off.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use wsgame_core::{ConnectionId, ReservedCommand};

/// Failure reported by a command handler.
///
/// Handler failures are logged by the receive loop; they never tear down the
/// sender's connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The collaborator refused or failed to process the command.
    #[error("command '{keyword}' failed: {reason}")]
    Failed { keyword: String, reason: String },
}

/// One matched command, as handed to a [`CommandHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Connection that sent the keyword.
    pub sender: ConnectionId,
    /// The exact keyword that matched.
    pub keyword: String,
}

impl CommandInvocation {
    /// The reserved command this keyword names, if it is one of the two
    /// built-in keywords.
    pub fn reserved(&self) -> Option<ReservedCommand> {
        ReservedCommand::parse(&self.keyword)
    }
}

/// A collaborator that reacts to one in-band command keyword.
///
/// Handlers are awaited on the sender's receive loop, so commands from one
/// connection are processed in arrival order.  A slow handler delays only
/// that connection's next read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, invocation: CommandInvocation) -> Result<(), CommandError>;
}

/// Placeholder handler for keywords no collaborator has claimed yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnwiredCommandHandler;

#[async_trait]
impl CommandHandler for UnwiredCommandHandler {
    async fn handle(&self, invocation: CommandInvocation) -> Result<(), CommandError> {
        match invocation.reserved() {
            Some(command) => info!(
                connection = %invocation.sender,
                %command,
                "reserved command received; no collaborator wired"
            ),
            None => info!(
                connection = %invocation.sender,
                keyword = %invocation.keyword,
                "command received; no collaborator wired"
            ),
        }
        Ok(())
    }
}

/// Maps command keywords to handlers.
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    /// A router with no keywords: every payload is broadcast.
    pub fn new() -> Self {
        Self::default()
    }

    /// A router with both reserved keywords bound to [`UnwiredCommandHandler`].
    pub fn with_reserved_defaults() -> Self {
        let mut router = Self::new();
        for cmd in ReservedCommand::ALL {
            router.register(cmd.keyword(), Arc::new(UnwiredCommandHandler));
        }
        router
    }

    /// Binds `keyword` to `handler`, returning the handler it replaced.
    pub fn register(
        &mut self,
        keyword: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.insert(keyword.into(), handler)
    }

    /// Registered keywords, sorted.
    pub fn keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keywords.sort_unstable();
        keywords
    }

    /// Runs the handler for `payload` if it is a registered keyword.
    ///
    /// Returns `None` when `payload` is ordinary text that should be
    /// broadcast instead.
    pub async fn invoke(
        &self,
        sender: ConnectionId,
        payload: &str,
    ) -> Option<Result<(), CommandError>> {
        let handler = self.handlers.get(payload)?;
        let invocation = CommandInvocation {
            sender,
            keyword: payload.to_string(),
        };
        Some(handler.handle(invocation).await)
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("keywords", &self.keywords())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_router_claims_both_reserved_keywords() {
        let router = CommandRouter::with_reserved_defaults();
        assert_eq!(router.keywords(), vec!["sendgifts", "updateresource"]);
    }

    #[test]
    fn test_empty_router_claims_nothing() {
        let router = CommandRouter::new();
        assert!(router.keywords().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_returns_none_for_ordinary_text() {
        let router = CommandRouter::with_reserved_defaults();
        assert!(router.invoke(ConnectionId::new(1), "hello").await.is_none());
    }

    #[tokio::test]
    async fn test_invoke_requires_exact_keyword() {
        let router = CommandRouter::with_reserved_defaults();
        assert!(router
            .invoke(ConnectionId::new(1), "sendgifts ")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unwired_handler_accepts_reserved_keyword() {
        let router = CommandRouter::with_reserved_defaults();
        let outcome = router.invoke(ConnectionId::new(3), "updateresource").await;
        assert_eq!(outcome, Some(Ok(())));
    }

    #[tokio::test]
    async fn test_registered_handler_receives_sender_and_keyword() {
        // Arrange
        let mut handler = MockCommandHandler::new();
        handler
            .expect_handle()
            .withf(|inv| inv.sender == ConnectionId::new(9) && inv.keyword == "sendgifts")
            .times(1)
            .returning(|_| Ok(()));
        let mut router = CommandRouter::new();
        router.register("sendgifts", Arc::new(handler));

        // Act
        let outcome = router.invoke(ConnectionId::new(9), "sendgifts").await;

        // Assert
        assert_eq!(outcome, Some(Ok(())));
    }

    #[tokio::test]
    async fn test_handler_error_is_returned_to_caller() {
        let mut handler = MockCommandHandler::new();
        handler.expect_handle().returning(|inv| {
            Err(CommandError::Failed {
                keyword: inv.keyword,
                reason: "store offline".to_string(),
            })
        });
        let mut router = CommandRouter::new();
        router.register("updateresource", Arc::new(handler));

        let outcome = router.invoke(ConnectionId::new(1), "updateresource").await;

        assert_eq!(
            outcome,
            Some(Err(CommandError::Failed {
                keyword: "updateresource".to_string(),
                reason: "store offline".to_string(),
            }))
        );
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        let mut router = CommandRouter::with_reserved_defaults();
        let previous = router.register("sendgifts", Arc::new(UnwiredCommandHandler));
        assert!(previous.is_some());
        assert_eq!(router.keywords().len(), 2);
    }

    #[test]
    fn test_custom_keyword_can_be_added() {
        let mut router = CommandRouter::new();
        router.register("ping-store", Arc::new(UnwiredCommandHandler));
        assert_eq!(router.keywords(), vec!["ping-store"]);
    }

    #[test]
    fn test_invocation_maps_back_to_reserved_command() {
        let inv = CommandInvocation {
            sender: ConnectionId::new(1),
            keyword: "sendgifts".to_string(),
        };
        assert_eq!(inv.reserved(), Some(ReservedCommand::SendGifts));
    }
}
