//! Gemini `generateContent` with a static capability table

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{ModelError, VisionModel};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapability {
    pub name: &'static str,
    pub reads_pdf: bool,
    pub context_window: u32,
}

/// Known models in fallback order
pub static GEMINI_MODELS: &[ModelCapability] = &[
    ModelCapability {
        name: "gemini-1.5-flash",
        reads_pdf: true,
        context_window: 1_000_000,
    },
    ModelCapability {
        name: "gemini-1.5-pro",
        reads_pdf: true,
        context_window: 2_000_000,
    },
    ModelCapability {
        name: "gemini-1.5-flash-8b",
        reads_pdf: true,
        context_window: 1_000_000,
    },
    ModelCapability {
        name: "gemini-1.0-pro",
        reads_pdf: false,
        context_window: 30_720,
    },
    ModelCapability {
        name: "gemini-pro",
        reads_pdf: false,
        context_window: 30_720,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    order: Vec<String>,
}

impl CapabilityTable {
    pub fn standard() -> Self {
        Self {
            order: GEMINI_MODELS.iter().map(|m| m.name.to_string()).collect(),
        }
    }

    /// Comma-separated override such as `ANALYSIS_MODELS=gemini-1.5-pro,gemini-1.5-flash`.
    /// A `models/` prefix is tolerated. Blank input keeps the standard order.
    pub fn from_override(spec: Option<&str>) -> Self {
        let order: Vec<String> = spec
            .unwrap_or_default()
            .split(',')
            .map(|m| m.trim().trim_start_matches("models/").to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if order.is_empty() {
            Self::standard()
        } else {
            Self { order }
        }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn capability(name: &str) -> Option<&'static ModelCapability> {
        GEMINI_MODELS.iter().find(|m| m.name == name)
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    table: CapabilityTable,
}

impl GeminiClient {
    pub fn new(api_key: &str, table: CapabilityTable) -> Result<Self, ModelError> {
        if api_key.is_empty() {
            return Err(ModelError::NotConfigured("GEMINI_API_KEY"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ModelError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            table,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn call(&self, model: &str, body: &serde_json::Value) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                model: model.to_string(),
                status,
                message,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ModelError::EmptyReply)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn analyze_pdf(&self, prompt: &str, pdf: &[u8]) -> Result<String, ModelError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": "application/pdf", "data": STANDARD.encode(pdf) } }
                ]
            }]
        });

        for model in self.table.order() {
            debug!(model = %model, "calling vision model");
            match self.call(model, &body).await {
                Ok(text) => {
                    info!(model = %model, "vision model answered");
                    return Ok(text);
                }
                Err(ModelError::Status { status: 404, .. }) => {
                    warn!(model = %model, "model not found, trying next in fallback order");
                }
                Err(e) => return Err(e),
            }
        }
        Err(ModelError::NoModelAvailable(self.table.order().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"{"candidates":[{"content":{"parts":[{"text":"{\"valid\":true}"}]}}]}"#;

    #[test]
    fn test_override_order() {
        let table = CapabilityTable::from_override(Some(" models/gemini-1.5-pro , gemini-pro,"));
        assert_eq!(table.order(), &["gemini-1.5-pro".to_string(), "gemini-pro".to_string()]);
        assert_eq!(CapabilityTable::from_override(Some("  ")), CapabilityTable::standard());
        assert!(CapabilityTable::capability("gemini-1.5-flash").unwrap().reads_pdf);
    }

    #[tokio::test]
    async fn test_walks_fallback_order_only_on_404() {
        let mut server = Server::new_async().await;
        let missing = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "g-key".into()))
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"not found"}}"#)
            .create_async()
            .await;
        let found = server
            .mock("POST", "/models/gemini-1.5-pro:generateContent")
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(r#""data":"JVBERg==""#.into()))
            .with_status(200)
            .with_body(REPLY)
            .create_async()
            .await;

        let client = GeminiClient::new("g-key", CapabilityTable::standard())
            .unwrap()
            .with_base_url(&server.url());
        let text = client.analyze_pdf("classify", b"%PDF").await.unwrap();

        assert_eq!(text, r#"{"valid":true}"#);
        missing.assert_async().await;
        found.assert_async().await;
    }

    #[tokio::test]
    async fn test_other_errors_stop_immediately() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;
        let next = server
            .mock("POST", "/models/gemini-1.5-pro:generateContent")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = GeminiClient::new("g-key", CapabilityTable::standard())
            .unwrap()
            .with_base_url(&server.url());
        let err = client.analyze_pdf("classify", b"%PDF").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Gemini API Error (Model: gemini-1.5-flash, Status: 403): API key not valid"
        );
        next.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_candidates_is_empty_reply() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("g-key", CapabilityTable::from_override(Some("gemini-1.5-flash")))
            .unwrap()
            .with_base_url(&server.url());
        assert_eq!(client.analyze_pdf("p", b"x").await, Err(ModelError::EmptyReply));
    }
}
