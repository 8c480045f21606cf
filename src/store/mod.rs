//! Persistence layer: libSQL-backed storage for messages and the applied-action log.

pub mod libsql_backend;
pub mod migrations;
pub mod stats;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use stats::{MailboxStats, RuleActionCount};
pub use traits::MailStore;
