use platform::PlatformError;
use readiness_engine::validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl ServiceError {
    /// Status carried into the response envelope
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::Unauthenticated => 401,
            ServiceError::NotFound(_) => 404,
            ServiceError::Invalid(_) | ServiceError::Validation(_) => 400,
            ServiceError::Platform(PlatformError::Status { status, .. }) => *status,
            ServiceError::Platform(PlatformError::NotFound(_)) => 404,
            ServiceError::Platform(_) => 500,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Platform(e.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
