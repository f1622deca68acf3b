//! Transactional email via the Resend API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PlatformError, Result};

/// Resend API endpoint
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

pub const SYSTEM_SENDER: &str = "Tender Engine System <system@tenderengine.co.za>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    pub reply_to: Option<String>,
    pub tags: Vec<(String, String)>,
}

impl EmailMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            from: SYSTEM_SENDER.to_string(),
            to,
            subject: subject.into(),
            html: html.into(),
            text: None,
            reply_to: None,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, name: &str, value: &str) -> Self {
        self.tags.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailSendResult {
    pub fn success(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Provider failures come back as an unsuccessful [`EmailSendResult`]
    async fn send(&self, message: &EmailMessage) -> Result<EmailSendResult>;
}

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<ResendTag<'a>>,
}

#[derive(Debug, Serialize)]
struct ResendTag<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendSuccessResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    api_url: String,
}

impl ResendMailer {
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(PlatformError::Config("RESEND_API_KEY cannot be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_url: RESEND_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }
}

fn user_message(status: u16, error_message: String) -> String {
    match status {
        401 => "Email service authentication failed.".to_string(),
        403 => "Email service access denied.".to_string(),
        422 => format!("Invalid email request: {}", error_message),
        429 => "Email rate limit exceeded. Please try again later.".to_string(),
        500..=599 => "Email service temporarily unavailable.".to_string(),
        _ => error_message,
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<EmailSendResult> {
        let tags: Vec<ResendTag> = message
            .tags
            .iter()
            .map(|(name, value)| ResendTag {
                name: name.as_str(),
                value: value.as_str(),
            })
            .collect();

        let payload = ResendPayload {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: message.text.as_deref(),
            reply_to: message.reply_to.as_deref(),
            tags,
        };

        info!(to = ?message.to, "Sending email via Resend");

        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Resend request failed: {}", e);
                return Ok(EmailSendResult::error("Failed to connect to email service."));
            }
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            return match response.json::<ResendSuccessResponse>().await {
                Ok(success) => {
                    info!(id = %success.id, "Email sent via Resend");
                    Ok(EmailSendResult::success(success.id))
                }
                Err(e) => {
                    // Accepted but unreadable; the mail most likely went out
                    warn!("Resend response parse error: {}", e);
                    Ok(EmailSendResult::success("resend:unknown"))
                }
            };
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!("Resend error ({}): {}", status, error_text);
        let error_message = match serde_json::from_str::<ResendErrorResponse>(&error_text) {
            Ok(err) => err.message.or(err.name).unwrap_or_else(|| format!("HTTP {}", status)),
            Err(_) => format!("HTTP {}: {}", status, error_text),
        };
        Ok(EmailSendResult::error(user_message(status, error_message)))
    }
}

/// Records every message instead of sending it
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<EmailSendResult> {
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        sent.push(message.clone());
        Ok(EmailSendResult::success(format!("memory:{}", sent.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resend_payload_omits_empty_fields() {
        let to = vec!["admin@tenderengine.co.za".to_string()];
        let payload = ResendPayload {
            from: SYSTEM_SENDER,
            to: &to,
            subject: "[TIER 2] Client Message: Acme",
            html: "<p>Hello</p>",
            text: None,
            reply_to: None,
            tags: vec![],
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("admin@tenderengine.co.za"));
        assert!(!json.contains("\"text\""));
        assert!(!json.contains("\"reply_to\""));
        assert!(!json.contains("\"tags\""));
    }

    #[test]
    fn test_user_messages_by_status() {
        assert_eq!(user_message(401, "x".into()), "Email service authentication failed.");
        assert_eq!(user_message(422, "bad to".into()), "Invalid email request: bad to");
        assert_eq!(user_message(503, "x".into()), "Email service temporarily unavailable.");
        assert_eq!(user_message(418, "teapot".into()), "teapot");
    }

    #[tokio::test]
    async fn test_send_success_and_rate_limit() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer re_test")
            .with_status(200)
            .with_body(r#"{"id":"msg_123"}"#)
            .expect(1)
            .create_async()
            .await;

        let mailer = ResendMailer::new("re_test")
            .unwrap()
            .with_api_url(&format!("{}/emails", server.url()));
        let message = EmailMessage::new(vec!["a@b.co.za".into()], "Weekly", "<p>hi</p>");

        let sent = mailer.send(&message).await.unwrap();
        assert_eq!(sent, EmailSendResult::success("msg_123"));

        let mut limited = Server::new_async().await;
        limited
            .mock("POST", "/emails")
            .with_status(429)
            .with_body(r#"{"name":"rate_limit_exceeded","message":"Too many requests"}"#)
            .create_async()
            .await;
        let mailer = ResendMailer::new("re_test")
            .unwrap()
            .with_api_url(&format!("{}/emails", limited.url()));
        let result = mailer.send(&message).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Email rate limit exceeded. Please try again later.")
        );
    }
}
