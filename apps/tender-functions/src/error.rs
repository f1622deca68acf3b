//! Error types for the functions server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use platform::PlatformError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// A secret or endpoint the function needs is not configured
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            FunctionError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            FunctionError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            FunctionError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            FunctionError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            // Backend failures surface as a bad request, like the rest of
            // the function's caught errors
            FunctionError::Platform(_) => (StatusCode::BAD_REQUEST, "BACKEND_ERROR"),
            FunctionError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Parse a JSON request body, reporting failures as a 400
pub fn parse_body<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, FunctionError> {
    serde_json::from_slice(bytes).map_err(|_| FunctionError::BadRequest("Invalid JSON".to_string()))
}
