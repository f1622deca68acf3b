//! Identity provider seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tender_types::SubscriptionTier;
use thiserror::Error;

/// Persisted session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user_id: user_id.into(),
            email: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileSnapshot {
    pub is_admin: bool,
    pub company_name: Option<String>,
    pub full_name: Option<String>,
    pub tier: SubscriptionTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Network failure, blocked request, provider outage
    #[error("identity provider unreachable: {0}")]
    Transient(String),

    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("profile not found for user {0}")]
    ProfileMissing(String),
}

impl IdentityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, access_token: &str) -> Result<VerifiedUser, IdentityError>;

    async fn load_profile(&self, user_id: &str) -> Result<ProfileSnapshot, IdentityError>;
}
