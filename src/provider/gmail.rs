//! Gmail REST client: lists and fetches messages, and modifies their labels.
//!
//! Authentication is a pre-issued OAuth bearer token; obtaining and refreshing
//! it happens outside this crate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::message::Message;
use crate::provider::gmail_types::{
    CreateLabelRequest, GmailMessage, Label, ListLabelsResponse, ListMessagesResponse,
    ModifyRequest, SYSTEM_LABELS, UNREAD_LABEL,
};
use crate::provider::{ActionEffect, ActionExecutor, MailProvider};
use crate::rules::model::ActionOp;

const PROVIDER: &str = "gmail";

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com";

/// Gmail caps `maxResults` per page at 500.
const MAX_PAGE_SIZE: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail client configuration.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// OAuth bearer token.
    pub access_token: SecretString,
    /// Scheme + host, without the `/gmail/v1` path.
    pub api_base: String,
    /// Gmail search query applied when listing (may be empty).
    pub query: String,
}

impl GmailConfig {
    pub fn new(access_token: SecretString) -> Self {
        Self {
            access_token,
            api_base: DEFAULT_API_BASE.to_string(),
            query: String::new(),
        }
    }
}

/// Gmail API client.
pub struct GmailClient {
    config: GmailConfig,
    client: reqwest::Client,
    /// Lowercased label name → label id.
    label_ids: Mutex<HashMap<String, String>>,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            config,
            client,
            label_ids: Mutex::new(HashMap::new()),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/me/{path}",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// Send an authorized request and decode the JSON response.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let resp = request
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthFailed {
                provider: PROVIDER.into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>().await.map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })
    }

    /// List message ids, following page tokens until `max_results` is reached.
    pub async fn list_message_ids(&self, max_results: usize) -> Result<Vec<String>, ProviderError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < max_results {
            let page_size = (max_results - ids.len()).min(MAX_PAGE_SIZE);
            let mut query = vec![("maxResults", page_size.to_string())];
            if !self.config.query.is_empty() {
                query.push(("q", self.config.query.clone()));
            }
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: ListMessagesResponse = self
                .send_json(self.client.get(self.api_url("messages")).query(&query))
                .await?;

            let received = page.messages.len();
            ids.extend(page.messages.into_iter().map(|m| m.id));
            debug!(received, total = ids.len(), "Listed message page");

            match page.next_page_token {
                Some(token) if received > 0 => page_token = Some(token),
                _ => break,
            }
        }

        ids.truncate(max_results);
        Ok(ids)
    }

    /// Fetch one message with its full payload.
    pub async fn get_message(&self, id: &str) -> Result<Message, ProviderError> {
        let raw: GmailMessage = self
            .send_json(
                self.client
                    .get(self.api_url(&format!("messages/{id}")))
                    .query(&[("format", "full")]),
            )
            .await?;
        Ok(raw.into_message())
    }

    async fn modify_labels(&self, message_id: &str, request: &ModifyRequest) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .send_json(
                self.client
                    .post(self.api_url(&format!("messages/{message_id}/modify")))
                    .json(request),
            )
            .await?;
        debug!(message_id, request = ?request, "Labels modified");
        Ok(())
    }

    /// Resolve a label name to its id, creating the label when it does not exist.
    pub async fn resolve_label_id(&self, name: &str) -> Result<String, ProviderError> {
        if let Some(system) = SYSTEM_LABELS.iter().find(|l| l.eq_ignore_ascii_case(name)) {
            return Ok((*system).to_string());
        }

        let key = name.to_lowercase();
        let mut cache = self.label_ids.lock().await;
        if let Some(id) = cache.get(&key) {
            return Ok(id.clone());
        }

        let listing: ListLabelsResponse = self
            .send_json(self.client.get(self.api_url("labels")))
            .await?;
        for label in listing.labels {
            cache.insert(label.name.to_lowercase(), label.id);
        }
        if let Some(id) = cache.get(&key) {
            return Ok(id.clone());
        }

        let created: Label = self
            .send_json(
                self.client
                    .post(self.api_url("labels"))
                    .json(&CreateLabelRequest::visible(name)),
            )
            .await?;
        info!(label = %created.name, id = %created.id, "Created label");
        cache.insert(key, created.id.clone());
        Ok(created.id)
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_messages(&self, max_results: usize) -> Result<Vec<Message>, ProviderError> {
        let ids = self.list_message_ids(max_results).await?;
        let mut messages = Vec::with_capacity(ids.len());

        for id in ids {
            match self.get_message(&id).await {
                Ok(message) => messages.push(message),
                Err(e) => warn!(message_id = %id, error = %e, "Skipping message that failed to load"),
            }
        }

        info!(count = messages.len(), "Fetched messages from Gmail");
        Ok(messages)
    }
}

#[async_trait]
impl ActionExecutor for GmailClient {
    async fn apply_action(&self, message_id: &str, op: &ActionOp) -> Result<ActionEffect, ProviderError> {
        let request = match op {
            ActionOp::SetRead(true) => ModifyRequest {
                remove_label_ids: vec![UNREAD_LABEL.into()],
                ..Default::default()
            },
            ActionOp::SetRead(false) => ModifyRequest {
                add_label_ids: vec![UNREAD_LABEL.into()],
                ..Default::default()
            },
            ActionOp::AddLabel(name) => ModifyRequest {
                add_label_ids: vec![self.resolve_label_id(name).await?],
                ..Default::default()
            },
        };
        self.modify_labels(message_id, &request).await?;
        Ok(ActionEffect::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_base_and_path() {
        let mut config = GmailConfig::new(SecretString::from("t"));
        config.api_base = "http://127.0.0.1:9999/".into();
        let client = GmailClient::new(config).unwrap();
        assert_eq!(
            client.api_url("messages/abc/modify"),
            "http://127.0.0.1:9999/gmail/v1/users/me/messages/abc/modify"
        );
    }

    #[tokio::test]
    async fn system_labels_resolve_without_network() {
        let mut config = GmailConfig::new(SecretString::from("t"));
        // Unroutable: any request would fail.
        config.api_base = "http://127.0.0.1:1".into();
        let client = GmailClient::new(config).unwrap();
        assert_eq!(client.resolve_label_id("trash").await.unwrap(), "TRASH");
        assert_eq!(client.resolve_label_id("INBOX").await.unwrap(), "INBOX");
    }
}
