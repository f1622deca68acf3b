//! Shared handles and the request envelope every service call goes through

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use platform::{Database, ObjectStorage};
use session_core::{with_timeout, Clock, TokioClock};
use tender_types::ApiResponse;
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};

/// Upper bound on a single service request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

#[derive(Clone)]
pub struct ServiceContext {
    pub db: Arc<dyn Database>,
    pub storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    user: Option<CurrentUser>,
    timeout: Duration,
    fixed_now: Option<DateTime<Utc>>,
}

impl ServiceContext {
    pub fn new(db: Arc<dyn Database>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            db,
            storage,
            clock: Arc::new(TokioClock::new()),
            user: None,
            timeout: REQUEST_TIMEOUT,
            fixed_now: None,
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pin wall-clock time for date arithmetic
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn user(&self) -> ServiceResult<&CurrentUser> {
        self.user.as_ref().ok_or(ServiceError::Unauthenticated)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Run `request` under the request timeout and fold the outcome into an envelope
    pub async fn run<T, F>(&self, request: F) -> ApiResponse<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        self.run_with_status(200, request).await
    }

    pub async fn run_with_status<T, F>(&self, status: u16, request: F) -> ApiResponse<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        match with_timeout(self.clock.as_ref(), self.timeout, request).await {
            Ok(Ok(data)) => ApiResponse::with_status(data, status),
            Ok(Err(e)) => {
                warn!(status = e.status(), "service request failed: {}", e);
                ApiResponse::error(e.to_string(), e.status())
            }
            Err(_) => {
                warn!("service request timed out after {:?}", self.timeout);
                ApiResponse::timed_out()
            }
        }
    }
}
