//! Response envelopes shared by the service layer and the serverless functions

use serde::{Deserialize, Serialize};

/// Normalized `{ data, error, status }` shape returned by every service call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(data, 200)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, 201)
    }

    pub fn with_status(data: T, status: u16) -> Self {
        Self {
            data: Some(data),
            error: None,
            status,
        }
    }

    pub fn error(message: impl Into<String>, status: u16) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            status,
        }
    }

    /// Partial success: the payload is usable but part of the write failed
    pub fn partial(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            error: Some(message.into()),
            status: 206,
        }
    }

    pub fn timed_out() -> Self {
        Self::error("Request timed out (Network/Extension Block)", 408)
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: self.data.map(f),
            error: self.error,
            status: self.status,
        }
    }
}

/// Error body of a function that must answer 200 even on failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Typed result at a function boundary. On the wire it is either the
/// success payload itself or `{error, details}`, so callers written against
/// the untyped shape keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionResult<T> {
    Failure(ErrorBody),
    Success(T),
}

impl<T> FunctionResult<T> {
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            FunctionResult::Success(value) => Ok(value),
            FunctionResult::Failure(body) => Err(body),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FunctionResult::Success(_))
    }
}

impl<T, E: Into<ErrorBody>> From<Result<T, E>> for FunctionResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => FunctionResult::Success(value),
            Err(err) => FunctionResult::Failure(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        valid: bool,
    }

    #[test]
    fn test_function_result_wire_shapes() {
        let ok: FunctionResult<Payload> = Ok::<_, ErrorBody>(Payload { valid: true }).into();
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "valid": true }));

        let err: FunctionResult<Payload> =
            Err::<Payload, _>(ErrorBody::new("AI Error").with_details("404")).into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": "AI Error", "details": "404" })
        );
    }

    #[test]
    fn test_function_result_decodes_error_first() {
        let decoded: FunctionResult<Payload> =
            serde_json::from_value(json!({ "error": "Missing file_path" })).unwrap();
        assert_eq!(decoded.into_result(), Err(ErrorBody::new("Missing file_path")));

        let decoded: FunctionResult<Payload> =
            serde_json::from_value(json!({ "valid": false })).unwrap();
        assert_eq!(decoded.into_result(), Ok(Payload { valid: false }));
    }

    #[test]
    fn test_api_response_constructors() {
        let resp: ApiResponse<u32> = ApiResponse::timed_out();
        assert_eq!(resp.status, 408);
        assert!(resp.data.is_none());

        let resp = ApiResponse::partial(1, "Tender created but requirement save failed");
        assert_eq!(resp.status, 206);
        assert_eq!(resp.data, Some(1));
        assert!(!resp.is_ok());
    }
}
