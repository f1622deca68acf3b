//! Language model clients

mod gemini;
mod openai;

pub use gemini::{CapabilityTable, GeminiClient, ModelCapability, GEMINI_MODELS};
pub use openai::{text_model_for_key, MockTextModel, OpenAiClient};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("System Configuration Error: Missing {0}.")]
    NotConfigured(&'static str),

    #[error("Gemini API Error (Model: {model}, Status: {status}): {message}")]
    Status { model: String, status: u16, message: String },

    #[error("No configured model is available: {}", .0.join(", "))]
    NoModelAvailable(Vec<String>),

    #[error("{0}")]
    Transport(String),

    #[error("AI returned empty response")]
    EmptyReply,
}

/// Reads a PDF alongside a prompt and answers with text
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn analyze_pdf(&self, prompt: &str, pdf: &[u8]) -> Result<String, ModelError>;
}

#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ModelError>;
}
