//! Hosted identity: token verification, profile lookup, admin user directory

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use session_core::{IdentityError, IdentityProvider, ProfileSnapshot, VerifiedUser};
use tender_types::SubscriptionTier;
use tracing::debug;

use crate::db::{Database, Query};
use crate::error::{PlatformError, Result};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Email lookup for user ids, backed by the auth admin API
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_email(&self, user_id: &str) -> Result<Option<String>>;
}

/// Client for the hosted auth endpoint. Token verification always carries
/// the project's anon key as `apikey`; the admin user API needs the service
/// role key.
#[derive(Debug, Clone)]
pub struct RestAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

impl RestAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PlatformError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_key: None,
        })
    }

    pub fn with_service_key(mut self, service_key: &str) -> Self {
        self.service_key = Some(service_key.to_string());
        self
    }

    fn admin_key(&self) -> &str {
        self.service_key.as_deref().unwrap_or(&self.anon_key)
    }
}

#[async_trait]
impl UserDirectory for RestAuth {
    async fn user_email(&self, user_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/admin/users/{}", self.base_url, user_id))
            .header("apikey", self.admin_key())
            .header("Authorization", format!("Bearer {}", self.admin_key()))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(response.json::<AuthUser>().await?.email),
            status => Err(PlatformError::status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    emails: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: &str, email: &str) {
        self.emails
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(user_id.to_string(), email.to_string());
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn user_email(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self
            .emails
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(user_id)
            .cloned())
    }
}

/// Identity provider over the hosted auth endpoint and the `profiles` and
/// `subscriptions` tables
pub struct HostedIdentity {
    auth: RestAuth,
    db: Arc<dyn Database>,
}

impl HostedIdentity {
    pub fn new(auth: RestAuth, db: Arc<dyn Database>) -> Self {
        Self { auth, db }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn verify_token(&self, access_token: &str) -> std::result::Result<VerifiedUser, IdentityError> {
        let response = self
            .auth
            .client
            .get(format!("{}/auth/v1/user", self.auth.base_url))
            .header("apikey", &self.auth.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|e| IdentityError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response
                    .json()
                    .await
                    .map_err(|e| IdentityError::Transient(e.to_string()))?;
                Ok(VerifiedUser {
                    id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdentityError::InvalidToken(
                response.text().await.unwrap_or_default(),
            )),
            status => Err(IdentityError::Transient(format!("auth endpoint answered {}", status))),
        }
    }

    async fn load_profile(&self, user_id: &str) -> std::result::Result<ProfileSnapshot, IdentityError> {
        let transient = |e: PlatformError| IdentityError::Transient(e.to_string());

        let rows = self
            .db
            .select(
                &Query::table("profiles")
                    .select("is_admin,company_name,full_name")
                    .eq("id", user_id)
                    .limit(1),
            )
            .await
            .map_err(transient)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::ProfileMissing(user_id.to_string()))?;
        let profile: ProfileRow =
            serde_json::from_value(row).map_err(|e| IdentityError::Transient(e.to_string()))?;

        let plan = self
            .db
            .select(
                &Query::table("subscriptions")
                    .select("plan_name")
                    .eq("user_id", user_id)
                    .eq("status", "active")
                    .limit(1),
            )
            .await
            .map_err(transient)?;
        let plan_name = plan
            .first()
            .and_then(|row| row.get("plan_name"))
            .and_then(|v| v.as_str());
        debug!(user_id, plan = ?plan_name, "resolved subscription tier");

        Ok(ProfileSnapshot {
            is_admin: profile.is_admin.unwrap_or(false),
            company_name: profile.company_name,
            full_name: profile.full_name,
            tier: SubscriptionTier::from_plan_name(plan_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;
    use mockito::Server;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_verify_token_classifies_responses() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer good")
            .with_status(200)
            .with_body(r#"{"id":"u1","email":"owner@acme.co.za"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .with_body(r#"{"msg":"invalid JWT"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer flaky")
            .with_status(503)
            .create_async()
            .await;

        let identity = HostedIdentity::new(
            RestAuth::new(&server.url(), "anon").unwrap().with_service_key("service"),
            Arc::new(MemoryDatabase::new()),
        );

        assert_eq!(identity.verify_token("good").await.unwrap().id, "u1");
        assert!(matches!(
            identity.verify_token("stale").await,
            Err(IdentityError::InvalidToken(_))
        ));
        assert!(identity.verify_token("flaky").await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_load_profile_resolves_tier() {
        let db = MemoryDatabase::new();
        db.seed(
            "profiles",
            vec![json!({"id": "u1", "is_admin": false, "company_name": "Acme", "full_name": "T N"})],
        );
        db.seed(
            "subscriptions",
            vec![
                json!({"user_id": "u1", "plan_name": "Standard", "status": "cancelled"}),
                json!({"user_id": "u1", "plan_name": "Enterprise", "status": "active"}),
            ],
        );
        let identity = HostedIdentity::new(RestAuth::new("http://localhost", "anon").unwrap(), Arc::new(db));

        let profile = identity.load_profile("u1").await.unwrap();
        assert_eq!(profile.tier, SubscriptionTier::Pro);
        assert_eq!(profile.company_name.as_deref(), Some("Acme"));
        assert!(!profile.is_admin);

        assert!(matches!(
            identity.load_profile("nobody").await,
            Err(IdentityError::ProfileMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_user_lookup() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/auth/v1/admin/users/u1")
            .match_header("apikey", "service")
            .match_header("authorization", "Bearer service")
            .with_status(200)
            .with_body(r#"{"id":"u1","email":"admin@tenderengine.co.za"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/v1/admin/users/u2")
            .with_status(404)
            .create_async()
            .await;

        let auth = RestAuth::new(&server.url(), "anon").unwrap().with_service_key("service");
        assert_eq!(
            auth.user_email("u1").await.unwrap().as_deref(),
            Some("admin@tenderengine.co.za")
        );
        assert_eq!(auth.user_email("u2").await.unwrap(), None);
    }
}
