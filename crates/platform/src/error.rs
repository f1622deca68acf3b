use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success answer from the hosted API
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl PlatformError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
