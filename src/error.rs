//! Error types for mail-rules.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Configuration-related errors, including invalid rule-set documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid rule set ({} violation(s)): {}", .violations.len(), .violations.join("; "))]
    InvalidRuleSet { violations: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Mail provider errors (fetching or modifying messages).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} request failed: {reason}")]
    Request { provider: String, reason: String },

    #[error("Provider {provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// A condition could not be evaluated against a message.
///
/// Never fatal: the condition counts as non-matching and the error is logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Invalid relative duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Message {message_id} has no received timestamp")]
    MissingTimestamp { message_id: String },

    #[error("Predicate {predicate} is not supported for field {field}")]
    UnsupportedPredicate { field: String, predicate: String },
}

/// A single action failed to apply. Processing continues with the next action.
#[derive(Debug, thiserror::Error)]
pub enum ActionExecutionError {
    #[error("Action {action} on message {message_id} failed: {source}")]
    Provider {
        message_id: String,
        action: String,
        #[source]
        source: ProviderError,
    },

    #[error("Action {action} is invalid: {reason}")]
    InvalidAction { action: String, reason: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
