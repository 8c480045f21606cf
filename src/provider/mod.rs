//! Mail provider seams: fetching messages and executing actions remotely.

pub mod gmail;
pub mod gmail_types;

pub use gmail::{GmailClient, GmailConfig};

use async_trait::async_trait;
use tracing::info;

use crate::error::ProviderError;
use crate::message::Message;
use crate::rules::model::ActionOp;

/// Source of message records.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Fetch up to `max_results` messages, newest first.
    async fn fetch_messages(&self, max_results: usize) -> Result<Vec<Message>, ProviderError>;
}

/// Whether an executor actually changed the remote mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEffect {
    /// The provider accepted the change.
    Applied,
    /// Nothing was sent; the action was only logged.
    Simulated,
}

/// Performs an action's side effect against the provider.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn apply_action(&self, message_id: &str, op: &ActionOp) -> Result<ActionEffect, ProviderError>;
}

/// Executor that only logs what it would do.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn apply_action(&self, message_id: &str, op: &ActionOp) -> Result<ActionEffect, ProviderError> {
        info!(message_id, op = ?op, "Dry run: action not sent to provider");
        Ok(ActionEffect::Simulated)
    }
}
