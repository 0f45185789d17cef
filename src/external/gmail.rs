use crate::config::GoogleConfig;
use crate::error::{AppError, AppResult};
use crate::utils::{EmailAddress, parse_address, parse_address_list};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: i64,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// `users.messages.get` with `format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    /// Milliseconds since the epoch, sent as a string.
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    data: String,
}

#[async_trait]
pub trait MailboxClient: Send + Sync {
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage>;

    async fn get_message(&self, access_token: &str, message_id: &str) -> AppResult<GmailMessage>;

    async fn get_attachment(
        &self,
        access_token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> AppResult<Vec<u8>>;

    async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<AccessToken>;
}

#[derive(Clone)]
pub struct GmailClient {
    client: Client,
    config: GoogleConfig,
}

impl GmailClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Gmail API returned {status}: {error_text}"
            )))
        }
    }
}

#[async_trait]
impl MailboxClient for GmailClient {
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        let url = format!("{GMAIL_API_BASE}/messages");
        let mut params = vec![("q", query), ("maxResults", "100")];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.get_json(access_token, &url, &params).await
    }

    async fn get_message(&self, access_token: &str, message_id: &str) -> AppResult<GmailMessage> {
        let url = format!("{GMAIL_API_BASE}/messages/{message_id}");
        self.get_json(access_token, &url, &[("format", "full")]).await
    }

    async fn get_attachment(
        &self,
        access_token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> AppResult<Vec<u8>> {
        let url = format!("{GMAIL_API_BASE}/messages/{message_id}/attachments/{attachment_id}");
        let body: AttachmentBody = self.get_json(access_token, &url, &[]).await?;
        decode_base64url(&body.data)
            .ok_or_else(|| AppError::ExternalApiError("Attachment is not valid base64".into()))
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<AccessToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Google token refresh returned {status}: {error_text}"
            )))
        }
    }
}

/// Gmail sends base64url, sometimes padded.
pub fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data.trim().trim_end_matches('=')).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

/// The parts of a Gmail message the ingestion loop cares about.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub provider_id: String,
    pub thread_id: String,
    /// `Message-ID` header, or the provider id when absent.
    pub message_id: String,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub date: DateTime<Utc>,
    pub attachments: Vec<AttachmentRef>,
}

impl ParsedMessage {
    pub fn from_gmail(message: &GmailMessage) -> Self {
        let header = |name: &str| {
            message
                .payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let date = message
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| {
                header("Date")
                    .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
                    .map(|d| d.with_timezone(&Utc))
            })
            .unwrap_or_else(Utc::now);

        let mut parsed = ParsedMessage {
            provider_id: message.id.clone(),
            thread_id: message.thread_id.clone(),
            message_id: header("Message-ID").unwrap_or_else(|| message.id.clone()),
            from: header("From").and_then(|v| parse_address(&v)),
            to: header("To").map(|v| parse_address_list(&v)).unwrap_or_default(),
            cc: header("Cc").map(|v| parse_address_list(&v)).unwrap_or_default(),
            subject: header("Subject"),
            text_body: None,
            html_body: None,
            date,
            attachments: Vec::new(),
        };
        collect_parts(&message.payload, &mut parsed);
        parsed
    }
}

fn collect_parts(part: &MessagePart, out: &mut ParsedMessage) {
    if !part.filename.is_empty() {
        if let Some(id) = part.body.attachment_id.as_ref() {
            out.attachments.push(AttachmentRef {
                attachment_id: id.clone(),
                filename: part.filename.clone(),
                content_type: part.mime_type.clone(),
                size: part.body.size,
            });
        }
    } else if let Some(data) = part.body.data.as_deref() {
        let decoded = decode_base64url(data).map(|b| String::from_utf8_lossy(&b).into_owned());
        match part.mime_type.as_str() {
            "text/plain" if out.text_body.is_none() => out.text_body = decoded,
            "text/html" if out.html_body.is_none() => out.html_body = decoded,
            _ => {}
        }
    }

    for child in &part.parts {
        collect_parts(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    fn sample() -> GmailMessage {
        let json = serde_json::json!({
            "id": "18c1",
            "threadId": "t-1",
            "internalDate": "1700000000000",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "From", "value": "Jane Runner <jane+race@example.com>"},
                    {"name": "To", "value": "Events <events@club.org>, ops@club.org"},
                    {"name": "Subject", "value": "Bib pickup?"},
                    {"name": "Message-Id", "value": "<abc@mail.example.com>"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/plain", "body": {"size": 5, "data": URL_SAFE.encode("hello?")}},
                            {"mimeType": "text/html", "body": {"size": 12, "data": URL_SAFE_NO_PAD.encode("<p>hello</p>")}}
                        ]
                    },
                    {"mimeType": "application/pdf", "filename": "waiver.pdf", "body": {"attachmentId": "att-1", "size": 2048}}
                ]
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_headers_bodies_and_attachments() {
        let parsed = ParsedMessage::from_gmail(&sample());
        assert_eq!(parsed.message_id, "<abc@mail.example.com>");
        assert_eq!(parsed.from.as_ref().unwrap().email, "jane+race@example.com");
        assert_eq!(parsed.to.len(), 2);
        assert_eq!(parsed.text_body.as_deref(), Some("hello?"));
        assert_eq!(parsed.html_body.as_deref(), Some("<p>hello</p>"));
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "waiver.pdf");
        assert_eq!(parsed.date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn falls_back_to_provider_id_without_message_id() {
        let mut message = sample();
        message
            .payload
            .headers
            .retain(|h| !h.name.eq_ignore_ascii_case("Message-ID"));
        let parsed = ParsedMessage::from_gmail(&message);
        assert_eq!(parsed.message_id, "18c1");
    }

    #[test]
    fn decodes_padded_and_unpadded() {
        assert_eq!(decode_base64url("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64url("aGk").unwrap(), b"hi");
        assert!(decode_base64url("***").is_none());
    }
}
