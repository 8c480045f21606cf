//! Gmail REST wire types and their conversion into [`Message`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Label id Gmail uses to mark unread messages.
pub const UNREAD_LABEL: &str = "UNREAD";

/// System labels that are addressed by name rather than by a generated id.
pub const SYSTEM_LABELS: &[&str] = &["INBOX", "TRASH", "SPAM", "STARRED", "IMPORTANT", "UNREAD"];

/// `GET users/me/messages`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

/// `GET users/me/messages/{id}?format=full`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    /// Milliseconds since the epoch, as a decimal string.
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    /// base64url-encoded content.
    pub data: Option<String>,
}

/// `GET users/me/labels`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLabelsResponse {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// `POST users/me/labels`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabelRequest {
    pub name: String,
    pub label_list_visibility: &'static str,
    pub message_list_visibility: &'static str,
}

impl CreateLabelRequest {
    pub fn visible(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        }
    }
}

/// `POST users/me/messages/{id}/modify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}

impl GmailMessage {
    /// Case-insensitive header lookup on the top-level payload.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// `Date` header if it parses, otherwise `internalDate`.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.header("Date")
            .and_then(parse_date_header)
            .or_else(|| {
                self.internal_date
                    .as_deref()
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(DateTime::from_timestamp_millis)
            })
    }

    pub fn into_message(self) -> Message {
        let received_at = self.received_at();
        let subject = self.header("Subject").unwrap_or_default().to_string();
        let sender = self.header("From").unwrap_or_default().to_string();
        let recipient = self.header("To").unwrap_or_default().to_string();
        let body = extract_body(&self.payload).unwrap_or_default();
        let is_read = !self.label_ids.iter().any(|l| l == UNREAD_LABEL);

        Message {
            id: self.id,
            thread_id: self.thread_id,
            subject,
            sender,
            recipient,
            received_at,
            snippet: self.snippet,
            body,
            is_read,
            labels: self.label_ids.into_iter().collect(),
        }
    }
}

/// Parse an RFC 2822 `Date` header, tolerating a trailing `(Zone)` comment.
pub fn parse_date_header(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = match raw.find(" (") {
        Some(idx) if raw.trim_end().ends_with(')') => &raw[..idx],
        _ => raw,
    };
    DateTime::parse_from_rfc2822(trimmed.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Text body of a message: the first `text/plain` part anywhere in the tree,
/// else the first `text/html` part.
pub fn extract_body(part: &MessagePart) -> Option<String> {
    find_part(part, "text/plain")
        .or_else(|| find_part(part, "text/html"))
        .and_then(|p| p.body.data.as_deref())
        .and_then(decode_body_data)
}

fn find_part<'a>(part: &'a MessagePart, mime_type: &str) -> Option<&'a MessagePart> {
    if part.mime_type.eq_ignore_ascii_case(mime_type) && part.body.data.is_some() {
        return Some(part);
    }
    part.parts.iter().find_map(|child| find_part(child, mime_type))
}

/// Decode base64url body data, with or without padding. Invalid UTF-8 is replaced.
pub fn decode_body_data(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    fn full_message() -> GmailMessage {
        let json = serde_json::json!({
            "id": "18c1",
            "threadId": "18c0",
            "labelIds": ["INBOX", "UNREAD", "CATEGORY_PROMOTIONS"],
            "snippet": "Big promotion",
            "internalDate": "1700000000000",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "subject", "value": "Big promotion sale"},
                    {"name": "From", "value": "Shop <deals@shop.com>"},
                    {"name": "To", "value": "me@example.com"},
                    {"name": "Date", "value": "Mon, 5 May 2025 10:30:45 +0000 (UTC)"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/html", "body": {"data": encode("<p>Sale!</p>")}},
                            {"mimeType": "text/plain", "body": {"data": encode("Sale! 50% off")}}
                        ]
                    },
                    {"mimeType": "application/pdf", "body": {}}
                ]
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn converts_full_message() {
        let msg = full_message().into_message();
        assert_eq!(msg.id, "18c1");
        assert_eq!(msg.thread_id, "18c0");
        assert_eq!(msg.subject, "Big promotion sale");
        assert_eq!(msg.sender, "Shop <deals@shop.com>");
        assert_eq!(msg.recipient, "me@example.com");
        assert_eq!(msg.body, "Sale! 50% off");
        assert!(!msg.is_read);
        assert!(msg.labels.contains("CATEGORY_PROMOTIONS"));
        assert_eq!(
            msg.received_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 5, 10, 30, 45).unwrap())
        );
    }

    #[test]
    fn html_used_when_no_plain_text() {
        let json = serde_json::json!({
            "id": "x",
            "payload": {"mimeType": "text/html", "body": {"data": encode("<b>hi</b>")}}
        });
        let msg: GmailMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.into_message().body, "<b>hi</b>");
    }

    #[test]
    fn missing_parts_give_empty_fields() {
        let msg: GmailMessage = serde_json::from_value(serde_json::json!({"id": "bare"})).unwrap();
        let msg = msg.into_message();
        assert_eq!(msg.subject, "");
        assert_eq!(msg.body, "");
        assert!(msg.received_at.is_none());
        assert!(msg.is_read);
    }

    #[test]
    fn internal_date_is_the_fallback() {
        let json = serde_json::json!({
            "id": "x",
            "internalDate": "1700000000000",
            "payload": {"headers": [{"name": "Date", "value": "not a date"}]}
        });
        let msg: GmailMessage = serde_json::from_value(json).unwrap();
        assert_eq!(
            msg.received_at(),
            DateTime::from_timestamp_millis(1_700_000_000_000)
        );
    }

    #[test]
    fn decodes_padded_and_unpadded_data() {
        assert_eq!(decode_body_data("aGk").as_deref(), Some("hi"));
        assert_eq!(decode_body_data("aGk=").as_deref(), Some("hi"));
        // '-' and '_' belong to the URL-safe alphabet
        assert_eq!(decode_body_data(&encode("??>>")).as_deref(), Some("??>>"));
        assert!(decode_body_data("***").is_none());
    }

    #[test]
    fn modify_request_skips_empty_lists() {
        let req = ModifyRequest {
            add_label_ids: vec![],
            remove_label_ids: vec![UNREAD_LABEL.into()],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"removeLabelIds": ["UNREAD"]})
        );
    }
}
