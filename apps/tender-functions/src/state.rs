//! Shared state for the function handlers

use std::sync::Arc;

use platform::{
    text_model_for_key, CapabilityTable, Database, GeminiClient, Mailer, ObjectStorage, ResendMailer,
    RestAuth, RestDatabase, RestObjectStorage, TextModel, UserDirectory, VisionModel,
};
use tracing::warn;

use crate::config::FunctionsConfig;
use crate::error::FunctionError;

const SERVER_CONFIG_ERROR: &str = "Server Configuration Error";

/// Hands out database and storage clients per request
pub trait Backend: Send + Sync {
    /// Service-role access; row level security does not apply
    fn service_db(&self) -> Result<Arc<dyn Database>, FunctionError>;

    fn service_storage(&self) -> Result<Arc<dyn ObjectStorage>, FunctionError>;

    /// Access scoped to the caller's `Authorization` header
    fn user_db(&self, authorization: &str) -> Result<Arc<dyn Database>, FunctionError>;

    fn user_storage(&self, authorization: &str) -> Result<Arc<dyn ObjectStorage>, FunctionError>;
}

/// REST clients against the hosted project
pub struct HostedBackend {
    config: Arc<FunctionsConfig>,
}

impl HostedBackend {
    pub fn new(config: Arc<FunctionsConfig>) -> Self {
        Self { config }
    }

    fn credentials<'a>(&'a self, key: &'a Option<String>) -> Result<(&'a str, &'a str), FunctionError> {
        match (self.config.project_url.as_deref(), key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(FunctionError::Config(SERVER_CONFIG_ERROR.to_string())),
        }
    }
}

impl Backend for HostedBackend {
    fn service_db(&self) -> Result<Arc<dyn Database>, FunctionError> {
        let (url, key) = self.credentials(&self.config.service_role_key)?;
        Ok(Arc::new(RestDatabase::new(url, key)?))
    }

    fn service_storage(&self) -> Result<Arc<dyn ObjectStorage>, FunctionError> {
        let (url, key) = self.credentials(&self.config.service_role_key)?;
        Ok(Arc::new(RestObjectStorage::new(url, key)?))
    }

    fn user_db(&self, authorization: &str) -> Result<Arc<dyn Database>, FunctionError> {
        let (url, key) = self.credentials(&self.config.anon_key)?;
        Ok(Arc::new(RestDatabase::new(url, key)?.with_bearer(authorization)))
    }

    fn user_storage(&self, authorization: &str) -> Result<Arc<dyn ObjectStorage>, FunctionError> {
        let (url, key) = self.credentials(&self.config.anon_key)?;
        Ok(Arc::new(RestObjectStorage::new(url, key)?.with_bearer(authorization)))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FunctionsConfig>,
    pub backend: Arc<dyn Backend>,
    /// Document reader; absent without a Gemini key
    pub vision: Option<Arc<dyn VisionModel>>,
    /// Section drafter; falls back to canned replies without a key
    pub text: Arc<dyn TextModel>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub directory: Option<Arc<dyn UserDirectory>>,
}

impl AppState {
    pub fn from_config(config: FunctionsConfig) -> Self {
        let config = Arc::new(config);

        let vision = config.gemini_api_key.as_deref().and_then(|key| {
            let table = CapabilityTable::from_override(config.analysis_models.as_deref());
            match GeminiClient::new(key, table) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn VisionModel>),
                Err(e) => {
                    warn!("document analysis disabled: {}", e);
                    None
                }
            }
        });

        let mailer = config
            .resend_api_key
            .as_deref()
            .and_then(|key| match ResendMailer::new(key) {
                Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn Mailer>),
                Err(e) => {
                    warn!("mail disabled: {}", e);
                    None
                }
            });

        let directory = match (config.project_url.as_deref(), config.service_role_key.as_deref()) {
            (Some(url), Some(key)) => match RestAuth::new(url, config.anon_key.as_deref().unwrap_or(key)) {
                Ok(auth) => Some(Arc::new(auth.with_service_key(key)) as Arc<dyn UserDirectory>),
                Err(e) => {
                    warn!("user directory disabled: {}", e);
                    None
                }
            },
            _ => None,
        };

        Self {
            text: text_model_for_key(config.openai_api_key.as_deref()),
            backend: Arc::new(HostedBackend::new(config.clone())),
            config,
            vision,
            mailer,
            directory,
        }
    }
}
