//! libSQL backend: async `MailStore` implementation.
//!
//! Supports local file and in-memory databases. Labels are stored as a
//! comma-separated list and timestamps as RFC 3339, matching the layout used
//! by databases from the earlier tool.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::message::{AppliedActionRecord, Message};
use crate::rules::model::ActionKind;
use crate::store::migrations;
use crate::store::stats::{MailboxStats, RuleActionCount, STATS_DAYS, STATS_TOP_SENDERS};
use crate::store::traits::MailStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite CURRENT_TIMESTAMP / datetime() output
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    None
}

fn labels_to_column(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn labels_from_column(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Read a nullable text column, mapping NULL to the empty string.
fn text_or_empty(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

/// Map a libsql Row to a Message.
///
/// Column order matches EMAIL_COLUMNS:
/// 0:id, 1:thread_id, 2:subject, 3:sender, 4:recipient, 5:parsed_date,
/// 6:snippet, 7:body, 8:is_read, 9:labels
fn row_to_message(row: &libsql::Row) -> Result<Message, libsql::Error> {
    let parsed_date: Option<String> = row.get::<String>(5).ok();

    Ok(Message {
        id: row.get(0)?,
        thread_id: text_or_empty(row, 1),
        subject: text_or_empty(row, 2),
        sender: text_or_empty(row, 3),
        recipient: text_or_empty(row, 4),
        received_at: parsed_date.as_deref().and_then(parse_datetime),
        snippet: text_or_empty(row, 6),
        body: text_or_empty(row, 7),
        is_read: row.get::<i64>(8).unwrap_or(0) != 0,
        labels: labels_from_column(&text_or_empty(row, 9)),
    })
}

/// Map a libsql Row to an AppliedActionRecord.
///
/// Column order matches ACTION_COLUMNS:
/// 0:email_id, 1:rule_id, 2:action_type, 3:action_value, 4:applied_at
fn row_to_record(row: &libsql::Row) -> Result<AppliedActionRecord, DatabaseError> {
    let action_type: String = row
        .get(2)
        .map_err(|e| DatabaseError::Serialization(format!("action_type: {e}")))?;
    let applied_at = text_or_empty(row, 4);

    Ok(AppliedActionRecord {
        message_id: text_or_empty(row, 0),
        rule_id: text_or_empty(row, 1),
        action_type: action_type
            .parse::<ActionKind>()
            .map_err(DatabaseError::Serialization)?,
        action_value: text_or_empty(row, 3),
        applied_at: parse_datetime(&applied_at).unwrap_or(DateTime::<Utc>::MIN_UTC),
    })
}

/// Drain `rows` into messages. A row that fails to map is skipped; a failed
/// step aborts with an error so a partial listing is never returned.
async fn collect_messages(mut rows: libsql::Rows) -> Result<Vec<Message>, DatabaseError> {
    let mut messages = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("reading email rows: {e}")))?
    {
        match row_to_message(&row) {
            Ok(msg) => messages.push(msg),
            Err(e) => warn!("Skipping email row: {e}"),
        }
    }
    Ok(messages)
}

/// Read a `COUNT(*)` column, clamping negative values to zero.
fn count_at(row: &libsql::Row, idx: i32) -> usize {
    row.get::<i64>(idx)
        .ok()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Drain two-column `(key, count)` rows.
async fn collect_counts(mut rows: libsql::Rows, what: &str) -> Result<Vec<(String, usize)>, DatabaseError> {
    let mut counts = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("stats {what}: {e}")))?
    {
        counts.push((text_or_empty(&row, 0), count_at(&row, 1)));
    }
    Ok(counts)
}

/// Display name of a `From` header: the text before `<`, or the whole value.
const SENDER_NAME_SQL: &str = r#"CASE WHEN instr(sender, '<') > 1
        THEN trim(substr(sender, 1, instr(sender, '<') - 1), ' "')
        ELSE trim(sender, ' "') END"#;

// ── Trait implementation ────────────────────────────────────────────

const EMAIL_COLUMNS: &str =
    "id, thread_id, subject, sender, recipient, parsed_date, snippet, body, is_read, labels";

const ACTION_COLUMNS: &str = "email_id, rule_id, action_type, action_value, applied_at";

#[async_trait]
impl MailStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn upsert_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO emails (id, thread_id, subject, sender, recipient, received_date,
                parsed_date, snippet, body, is_read, labels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                thread_id = excluded.thread_id,
                subject = excluded.subject,
                sender = excluded.sender,
                recipient = excluded.recipient,
                received_date = excluded.received_date,
                parsed_date = excluded.parsed_date,
                snippet = excluded.snippet,
                body = excluded.body,
                is_read = excluded.is_read,
                labels = excluded.labels",
            params![
                message.id.clone(),
                message.thread_id.clone(),
                message.subject.clone(),
                message.sender.clone(),
                message.recipient.clone(),
                opt_text_owned(message.received_at.map(|d| d.to_rfc2822())),
                opt_text_owned(message.received_at.map(|d| d.to_rfc3339())),
                message.snippet.clone(),
                message.body.clone(),
                i64::from(message.is_read),
                labels_to_column(&message.labels),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_message: {e}")))?;

        debug!(id = %message.id, "Message upserted into DB");
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let msg = row_to_message(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }

    async fn list_messages(&self, limit: usize) -> Result<Vec<Message>, DatabaseError> {
        let conn = self.conn();
        let rows = conn
            .query(
                &format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails ORDER BY parsed_date DESC, id ASC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        collect_messages(rows).await
    }

    async fn update_message_state(&self, message: &Message) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE emails SET is_read = ?1, labels = ?2 WHERE id = ?3",
                params![
                    i64::from(message.is_read),
                    labels_to_column(&message.labels),
                    message.id.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_message_state: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::Query(format!(
                "update_message_state: no stored message with id {}",
                message.id
            )));
        }
        debug!(id = %message.id, is_read = message.is_read, "Message state updated in DB");
        Ok(())
    }

    // ── Applied actions ─────────────────────────────────────────────

    async fn record_applied_action(&self, record: &AppliedActionRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO rule_actions (email_id, rule_id, action_type, action_value, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.message_id.clone(),
                record.rule_id.clone(),
                record.action_type.as_str(),
                record.action_value.clone(),
                record.applied_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_applied_action: {e}")))?;

        debug!(
            message_id = %record.message_id,
            rule_id = %record.rule_id,
            action = %record.action_type,
            "Applied action recorded"
        );
        Ok(())
    }

    async fn list_applied_actions(
        &self,
        message_id: Option<&str>,
    ) -> Result<Vec<AppliedActionRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = match message_id {
            Some(id) => {
                conn.query(
                    &format!(
                        "SELECT {ACTION_COLUMNS} FROM rule_actions WHERE email_id = ?1 ORDER BY id ASC"
                    ),
                    params![id],
                )
                .await
            }
            None => {
                conn.query(
                    &format!("SELECT {ACTION_COLUMNS} FROM rule_actions ORDER BY id ASC"),
                    (),
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::Query(format!("list_applied_actions: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_applied_actions: {e}")))?
        {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping rule_actions row: {e}"),
            }
        }
        Ok(records)
    }

    // ── Statistics ──────────────────────────────────────────────────

    async fn stats(&self) -> Result<MailboxStats, DatabaseError> {
        let conn = self.conn();

        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN COALESCE(is_read, 0) = 0 THEN 1 ELSE 0 END), 0)
                 FROM emails",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stats totals: {e}")))?;
        let (total, unread) = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("stats totals: {e}")))?
        {
            Some(row) => (count_at(&row, 0), count_at(&row, 1)),
            None => (0, 0),
        };

        let rows = conn
            .query(
                "SELECT DATE(parsed_date) AS day, COUNT(*) FROM emails
                 WHERE DATE(parsed_date) IS NOT NULL
                 GROUP BY day ORDER BY day DESC LIMIT ?1",
                params![STATS_DAYS as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stats by day: {e}")))?;
        let by_day = collect_counts(rows, "by day").await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {SENDER_NAME_SQL} AS name, COUNT(*) AS n FROM emails
                     WHERE sender IS NOT NULL
                     GROUP BY name HAVING name != ''
                     ORDER BY n DESC, name ASC LIMIT ?1"
                ),
                params![STATS_TOP_SENDERS as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stats senders: {e}")))?;
        let top_senders = collect_counts(rows, "senders").await?;

        let mut rows = conn
            .query("SELECT labels FROM emails WHERE labels IS NOT NULL AND labels != ''", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("stats labels: {e}")))?;
        let mut label_counts: HashMap<String, usize> = HashMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("stats labels: {e}")))?
        {
            for label in labels_from_column(&text_or_empty(&row, 0)) {
                *label_counts.entry(label).or_default() += 1;
            }
        }
        let mut labels: Vec<(String, usize)> = label_counts.into_iter().collect();
        labels.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut rows = conn
            .query(
                "SELECT rule_id, action_type, COUNT(*) AS n FROM rule_actions
                 GROUP BY rule_id, action_type
                 ORDER BY n DESC, rule_id ASC, action_type ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stats rule actions: {e}")))?;
        let mut rule_actions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("stats rule actions: {e}")))?
        {
            rule_actions.push(RuleActionCount {
                rule_id: text_or_empty(&row, 0),
                action_type: text_or_empty(&row, 1),
                count: count_at(&row, 2),
            });
        }

        debug!(total, unread, "Mailbox statistics computed");
        Ok(MailboxStats {
            total,
            unread,
            by_day,
            top_senders,
            labels,
            rule_actions,
        })
    }
}
