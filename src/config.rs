//! Runtime configuration read from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::provider::GmailConfig;
use crate::provider::gmail::DEFAULT_API_BASE;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Rule-set JSON document.
    pub rules_path: PathBuf,
    /// Maximum messages fetched from the provider per run.
    pub fetch_limit: usize,
    /// Maximum stored messages evaluated per processing run.
    pub process_limit: usize,
    /// Log actions instead of sending them to the provider.
    pub dry_run: bool,
    pub gmail_access_token: Option<SecretString>,
    pub gmail_api_base: String,
    pub gmail_query: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/mail-rules.db"),
            rules_path: PathBuf::from("email_rules.json"),
            fetch_limit: 50,
            process_limit: 100,
            dry_run: false,
            gmail_access_token: None,
            gmail_api_base: DEFAULT_API_BASE.to_string(),
            gmail_query: String::new(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset and blank variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            db_path: get("MAIL_RULES_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            rules_path: get("MAIL_RULES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.rules_path),
            fetch_limit: match get("MAIL_RULES_FETCH_LIMIT") {
                Some(raw) => parse_limit("MAIL_RULES_FETCH_LIMIT", &raw)?,
                None => defaults.fetch_limit,
            },
            process_limit: match get("MAIL_RULES_PROCESS_LIMIT") {
                Some(raw) => parse_limit("MAIL_RULES_PROCESS_LIMIT", &raw)?,
                None => defaults.process_limit,
            },
            dry_run: match get("MAIL_RULES_DRY_RUN") {
                Some(raw) => parse_bool("MAIL_RULES_DRY_RUN", &raw)?,
                None => defaults.dry_run,
            },
            gmail_access_token: get("GMAIL_ACCESS_TOKEN").map(SecretString::from),
            gmail_api_base: get("GMAIL_API_BASE").unwrap_or(defaults.gmail_api_base),
            gmail_query: lookup("GMAIL_QUERY").unwrap_or_default(),
        })
    }

    /// Gmail client settings. Fails when no access token is configured.
    pub fn gmail_config(&self) -> Result<GmailConfig, ConfigError> {
        let access_token = self
            .gmail_access_token
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".into()))?;
        Ok(GmailConfig {
            access_token,
            api_base: self.gmail_api_base.clone(),
            query: self.gmail_query.clone(),
        })
    }
}

fn parse_limit(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("'{raw}' is not a positive integer: {e}"),
        }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
