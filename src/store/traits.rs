//! `MailStore` trait: the persistence capability the rule pipeline needs.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::message::{AppliedActionRecord, Message};
use crate::store::stats::MailboxStats;

/// Backend-agnostic store for fetched messages and the applied-action log.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Insert a message, or overwrite every field of the stored copy with the same id.
    async fn upsert_message(&self, message: &Message) -> Result<(), DatabaseError>;

    /// Look up a message by provider id.
    async fn get_message(&self, id: &str) -> Result<Option<Message>, DatabaseError>;

    /// Stored messages, newest first, up to `limit`.
    async fn list_messages(&self, limit: usize) -> Result<Vec<Message>, DatabaseError>;

    /// Persist the mutable fields (`is_read`, `labels`) of an existing message.
    async fn update_message_state(&self, message: &Message) -> Result<(), DatabaseError>;

    // ── Applied actions ─────────────────────────────────────────────

    /// Append one record to the audit log.
    async fn record_applied_action(&self, record: &AppliedActionRecord) -> Result<(), DatabaseError>;

    /// Audit records in insertion order, optionally for a single message.
    async fn list_applied_actions(
        &self,
        message_id: Option<&str>,
    ) -> Result<Vec<AppliedActionRecord>, DatabaseError>;

    // ── Statistics ──────────────────────────────────────────────────

    /// Counts over stored messages and the audit log.
    async fn stats(&self) -> Result<MailboxStats, DatabaseError>;
}
