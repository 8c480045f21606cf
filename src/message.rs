//! Message records as fetched from the provider, and the applied-action audit log.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::model::ActionKind;

/// One email as fetched from the provider and stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-native message id (unique).
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    /// `From` header.
    pub sender: String,
    /// `To` header.
    pub recipient: String,
    /// `None` when the provider gave no parsable date.
    pub received_at: Option<DateTime<Utc>>,
    pub snippet: String,
    pub body: String,
    pub is_read: bool,
    /// Labels as the provider reported them (system ids such as `INBOX` and
    /// `UNREAD`, user label ids). Labels added locally by a move are stored by
    /// name, since that is what the rule names.
    pub labels: BTreeSet<String>,
}

impl Message {
    /// Create a message with the given id and every other field empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: String::new(),
            subject: String::new(),
            sender: String::new(),
            recipient: String::new(),
            received_at: None,
            snippet: String::new(),
            body: String::new(),
            is_read: false,
            labels: BTreeSet::new(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Subject truncated for log lines.
    pub fn subject_preview(&self) -> String {
        let preview: String = self.subject.chars().take(40).collect();
        if preview.len() < self.subject.len() {
            format!("{preview}...")
        } else {
            preview
        }
    }
}

/// Audit record for one successfully applied action. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedActionRecord {
    pub message_id: String,
    pub rule_id: String,
    pub action_type: ActionKind,
    /// Action value rendered as text (`true`, `false`, or a label name).
    pub action_value: String,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let msg = Message::new("m1")
            .with_sender("news@newsletter.com")
            .with_subject("Weekly update")
            .with_labels(["INBOX", "UNREAD"]);

        assert_eq!(msg.id, "m1");
        assert_eq!(msg.sender, "news@newsletter.com");
        assert!(msg.labels.contains("UNREAD"));
        assert!(!msg.is_read);
        assert!(msg.received_at.is_none());
    }

    #[test]
    fn subject_preview_truncates_long_subjects() {
        let msg = Message::new("m1").with_subject("x".repeat(60));
        assert_eq!(msg.subject_preview(), format!("{}...", "x".repeat(40)));

        let short = Message::new("m2").with_subject("Hi");
        assert_eq!(short.subject_preview(), "Hi");
    }
}
