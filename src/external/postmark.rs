use crate::config::PostmarkConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    /// Postmark tag used for reporting.
    pub tag: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    message_stream: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmailResponse {
    error_code: i64,
    message: String,
    #[serde(rename = "MessageID")]
    message_id: Option<String>,
}

#[derive(Clone)]
pub struct PostmarkService {
    client: Client,
    config: PostmarkConfig,
}

impl PostmarkService {
    pub fn new(config: PostmarkConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for PostmarkService {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        if self.config.server_token.is_empty() {
            return Err(AppError::ConfigError(
                "Postmark server token is not configured".to_string(),
            ));
        }

        let url = format!("{}/email", self.config.base_url.trim_end_matches('/'));
        let body = PostmarkEmailRequest {
            from: &self.config.from_email,
            to: &email.to,
            subject: &email.subject,
            text_body: &email.text_body,
            html_body: email.html_body.as_deref(),
            tag: email.tag.as_deref(),
            message_stream: "outbound",
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.config.server_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Postmark returned {status}: {error_text}"
            )));
        }

        let parsed: PostmarkEmailResponse = response.json().await?;
        if parsed.error_code != 0 {
            return Err(AppError::ExternalApiError(format!(
                "Postmark error {}: {}",
                parsed.error_code, parsed.message
            )));
        }

        log::info!(
            "Email sent to {} ({})",
            email.to,
            parsed.message_id.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}
