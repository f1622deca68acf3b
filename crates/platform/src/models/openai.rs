//! Chat-completions client for section drafting

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{ModelError, TextModel};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Result<Self, ModelError> {
        if api_key.is_empty() {
            return Err(ModelError::NotConfigured("OPENAI_API_KEY"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ModelError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_TEXT_MODEL.to_string(),
            temperature: 0.7,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ModelError> {
        let system = if system.is_empty() {
            "You are a helpful assistant."
        } else {
            system
        };
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| "OpenAI API Error".to_string());
            return Err(ModelError::Transport(message));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyReply)
    }
}

/// Deterministic stand-in used when no text-model key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTextModel;

#[async_trait]
impl TextModel for MockTextModel {
    async fn generate(&self, prompt: &str, _system: &str) -> Result<String, ModelError> {
        let head: String = prompt.chars().take(50).collect();
        Ok(format!(
            "[MOCK AI OUTPUT]\n\nBased on your request: \"{}...\"\n\nThis is a simulated response because no API key was configured. In production, this would call the LLM provider.",
            head
        ))
    }
}

pub fn text_model_for_key(api_key: Option<&str>) -> Arc<dyn TextModel> {
    match api_key.filter(|k| !k.is_empty()).map(OpenAiClient::new) {
        Some(Ok(client)) => Arc::new(client),
        Some(Err(e)) => {
            warn!("text model unavailable ({}), using mock replies", e);
            Arc::new(MockTextModel)
        }
        None => {
            warn!("OPENAI_API_KEY not found. Using mock AI responses.");
            Arc::new(MockTextModel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_chat_completion_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r##"{"choices":[{"message":{"role":"assistant","content":"{\"content_markdown\":\"# Scope\"}"}}]}"##)
            .create_async()
            .await;

        let client = OpenAiClient::new("sk-test").unwrap().with_base_url(&server.url());
        let text = client.generate("Draft a method statement", "").await.unwrap();

        assert_eq!(text, r##"{"content_markdown":"# Scope"}"##);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_message_is_surfaced() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new("sk-bad").unwrap().with_base_url(&server.url());
        assert_eq!(
            client.generate("x", "").await,
            Err(ModelError::Transport("Incorrect API key provided".into()))
        );
    }

    #[tokio::test]
    async fn test_mock_model_without_key() {
        let model = text_model_for_key(None);
        let text = model.generate("Write the Scope of Works section", "").await.unwrap();
        assert!(text.starts_with("[MOCK AI OUTPUT]"));
        assert!(text.contains("Write the Scope of Works section"));
    }
}
