//! Session state machine
//!
//! `LOADING → {AUTHENTICATED, UNAUTHENTICATED, LIMITED}`. Verification runs
//! against the [`IdentityProvider`] under a timeout taken from the injected
//! [`Clock`]. Concurrent callers for the same user share one in-flight
//! verification; a user already verified in this session is not re-checked.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tender_types::SubscriptionTier;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::{with_timeout, Clock};
use crate::events::{AuthEvent, FloodGuard};
use crate::identity::{IdentityError, IdentityProvider, Session};
use crate::storage::ResilientStorage;

pub const SESSION_STORAGE_KEY: &str = "tender-engine-auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Loading,
    Authenticated,
    Unauthenticated,
    /// Session kept but the provider could not confirm it
    Limited,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminStatus {
    #[default]
    Unknown,
    Admin,
    NotAdmin,
}

impl AdminStatus {
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("auth listener detached after an event flood")]
    ListenerDetached,

    #[error("failed to encode session: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub verify_timeout: Duration,
    pub profile_timeout: Duration,
    pub flood_limit: usize,
    pub flood_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verify_timeout: Duration::from_secs(10),
            profile_timeout: Duration::from_secs(15),
            flood_limit: 10,
            flood_window: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub session: Option<Session>,
    pub admin: AdminStatus,
    pub tier: SubscriptionTier,
    pub company_name: Option<String>,
    pub full_name: Option<String>,
}

pub enum EventOutcome {
    Updated,
    SignedOut,
    /// Background verification was started for a new user
    Verifying(JoinHandle<AuthState>),
}

type VerifyFuture = Shared<BoxFuture<'static, AuthState>>;

struct InFlight {
    user_id: String,
    generation: u64,
    future: VerifyFuture,
}

struct Inner {
    state: AuthState,
    session: Option<Session>,
    admin: AdminStatus,
    tier: SubscriptionTier,
    company_name: Option<String>,
    full_name: Option<String>,
    verified: HashSet<String>,
    in_flight: Option<InFlight>,
    flood: FloodGuard,
    /// Bumped on every reset so late verification results are discarded
    generation: u64,
}

impl Inner {
    fn new(config: &SessionConfig) -> Self {
        Self {
            state: AuthState::Loading,
            session: None,
            admin: AdminStatus::Unknown,
            tier: SubscriptionTier::Free,
            company_name: None,
            full_name: None,
            verified: HashSet::new(),
            in_flight: None,
            flood: FloodGuard::new(config.flood_limit, config.flood_window),
            generation: 0,
        }
    }

    fn reset(&mut self) {
        self.state = AuthState::Unauthenticated;
        self.session = None;
        self.clear_identity();
        self.verified.clear();
        self.in_flight = None;
        self.generation += 1;
    }

    fn clear_identity(&mut self) {
        self.admin = AdminStatus::Unknown;
        self.tier = SubscriptionTier::Free;
        self.company_name = None;
        self.full_name = None;
    }
}

enum VerifyStep {
    Done(AuthState),
    Await(VerifyFuture),
}

#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    storage: ResilientStorage,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    inner: Arc<Mutex<Inner>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: ResilientStorage, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(provider, storage, clock, SessionConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn IdentityProvider>,
        storage: ResilientStorage,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new(&config))),
            provider,
            storage,
            clock,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let inner = self.lock();
        AuthSnapshot {
            state: inner.state,
            session: inner.session.clone(),
            admin: inner.admin,
            tier: inner.tier,
            company_name: inner.company_name.clone(),
            full_name: inner.full_name.clone(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.lock().state
    }

    pub fn listener_attached(&self) -> bool {
        !self.lock().flood.is_tripped()
    }

    /// Load the optimistic session from storage without contacting the provider
    pub fn restore(&self) -> Option<Session> {
        let stored = self
            .storage
            .get(SESSION_STORAGE_KEY)
            .and_then(|raw| match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable persisted session");
                    self.storage.remove(SESSION_STORAGE_KEY);
                    None
                }
            });

        let mut inner = self.lock();
        match stored {
            Some(session) => {
                debug!(user_id = %session.user_id, "restored persisted session");
                inner.session = Some(session.clone());
                inner.state = AuthState::Loading;
                Some(session)
            }
            None => {
                inner.state = AuthState::Unauthenticated;
                None
            }
        }
    }

    /// Restore then verify; resolves once verification and profile load settle
    pub async fn initialize(&self) -> AuthState {
        if self.restore().is_none() {
            return AuthState::Unauthenticated;
        }
        self.verify().await
    }

    pub async fn verify(&self) -> AuthState {
        let step = {
            let mut inner = self.lock();
            match inner.session.clone() {
                None => {
                    inner.state = AuthState::Unauthenticated;
                    VerifyStep::Done(AuthState::Unauthenticated)
                }
                Some(session) if inner.verified.contains(&session.user_id) => VerifyStep::Done(inner.state),
                Some(session) => {
                    let joinable = inner
                        .in_flight
                        .as_ref()
                        .filter(|f| f.user_id == session.user_id && f.generation == inner.generation)
                        .map(|f| f.future.clone());
                    match joinable {
                        Some(future) => {
                            debug!(user_id = %session.user_id, "joining in-flight verification");
                            VerifyStep::Await(future)
                        }
                        None => {
                            let generation = inner.generation;
                            let user_id = session.user_id.clone();
                            let future = self.clone().run_verification(session, generation).boxed().shared();
                            inner.in_flight = Some(InFlight {
                                user_id,
                                generation,
                                future: future.clone(),
                            });
                            VerifyStep::Await(future)
                        }
                    }
                }
            }
        };

        match step {
            VerifyStep::Done(state) => state,
            VerifyStep::Await(future) => future.await,
        }
    }

    /// Drop the per-user guard and verify again
    pub async fn reverify(&self) -> AuthState {
        {
            let mut inner = self.lock();
            if let Some(user_id) = inner.session.as_ref().map(|s| s.user_id.clone()) {
                inner.verified.remove(&user_id);
            }
        }
        self.verify().await
    }

    async fn run_verification(self, session: Session, generation: u64) -> AuthState {
        let outcome = with_timeout(
            self.clock.as_ref(),
            self.config.verify_timeout,
            self.provider.verify_token(&session.access_token),
        )
        .await;

        let state = match outcome {
            Ok(Ok(user)) => {
                info!(user_id = %user.id, "session verified");
                let applied = self.apply(generation, |inner| {
                    inner.state = AuthState::Authenticated;
                    inner.verified.insert(user.id.clone());
                });
                if applied {
                    self.load_profile(&user.id, generation).await;
                }
                AuthState::Authenticated
            }
            Ok(Err(IdentityError::InvalidToken(reason))) => {
                warn!(user_id = %session.user_id, %reason, "session token rejected, clearing");
                if self.apply(generation, Inner::reset) {
                    self.storage.remove(SESSION_STORAGE_KEY);
                }
                AuthState::Unauthenticated
            }
            Ok(Err(e)) => {
                warn!(user_id = %session.user_id, error = %e, "verification failed, entering limited mode");
                self.apply(generation, |inner| inner.state = AuthState::Limited);
                AuthState::Limited
            }
            Err(elapsed) => {
                warn!(user_id = %session.user_id, "verification {}, entering limited mode", elapsed);
                self.apply(generation, |inner| inner.state = AuthState::Limited);
                AuthState::Limited
            }
        };

        let mut inner = self.lock();
        let finished = matches!(
            &inner.in_flight,
            Some(flight) if flight.user_id == session.user_id && flight.generation == generation
        );
        if finished {
            inner.in_flight = None;
        }
        if inner.generation == generation {
            state
        } else {
            inner.state
        }
    }

    async fn load_profile(&self, user_id: &str, generation: u64) {
        let outcome = with_timeout(
            self.clock.as_ref(),
            self.config.profile_timeout,
            self.provider.load_profile(user_id),
        )
        .await;

        match outcome {
            Ok(Ok(profile)) => {
                debug!(user_id, is_admin = profile.is_admin, tier = ?profile.tier, "profile loaded");
                self.apply(generation, |inner| {
                    inner.admin = if profile.is_admin {
                        AdminStatus::Admin
                    } else {
                        AdminStatus::NotAdmin
                    };
                    inner.tier = profile.tier;
                    inner.company_name = profile.company_name;
                    inner.full_name = profile.full_name;
                });
            }
            Ok(Err(e)) => warn!(user_id, error = %e, "profile load failed, keeping previous values"),
            Err(elapsed) => warn!(user_id, "profile load {}, keeping previous values", elapsed),
        }
    }

    /// Run `update` only if no reset happened since `generation` was taken
    fn apply(&self, generation: u64, update: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("discarding stale verification result");
            return false;
        }
        update(&mut inner);
        true
    }

    pub fn sign_out(&self) {
        self.lock().reset();
        self.storage.remove(SESSION_STORAGE_KEY);
        info!("signed out");
    }

    fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)?;
        self.storage.set(SESSION_STORAGE_KEY, &raw);
        Ok(())
    }

    /// Feed one provider auth event. Must be called inside a Tokio runtime
    /// because new sign-ins spawn their verification.
    pub fn on_event(&self, event: AuthEvent) -> Result<EventOutcome, SessionError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        if !inner.flood.record(now) {
            error!(event = event.name(), "auth event flood detected, detaching listener");
            return Err(SessionError::ListenerDetached);
        }
        debug!(event = event.name(), "auth event");

        match event {
            AuthEvent::SignedOut => {
                drop(inner);
                self.sign_out();
                Ok(EventOutcome::SignedOut)
            }
            AuthEvent::TokenRefreshed(session) => {
                inner.session = Some(session.clone());
                drop(inner);
                self.persist(&session)?;
                Ok(EventOutcome::Updated)
            }
            AuthEvent::InitialSession(None) => {
                if inner.session.is_none() {
                    inner.state = AuthState::Unauthenticated;
                }
                Ok(EventOutcome::Updated)
            }
            AuthEvent::SignedIn(session) | AuthEvent::InitialSession(Some(session)) => {
                let same_user = inner.session.as_ref().map(|s| s.user_id.as_str()) == Some(session.user_id.as_str());
                if !same_user {
                    inner.clear_identity();
                    inner.state = AuthState::Loading;
                }
                let known = inner.verified.contains(&session.user_id);
                inner.session = Some(session.clone());
                drop(inner);
                self.persist(&session)?;

                if known {
                    return Ok(EventOutcome::Updated);
                }
                let manager = self.clone();
                Ok(EventOutcome::Verifying(tokio::spawn(async move { manager.verify().await })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::{ProfileSnapshot, VerifiedUser};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        Invalid,
        Transient,
        Hang,
    }

    struct MockProvider {
        verify_reply: Mutex<Reply>,
        profile_reply: Mutex<Reply>,
        is_admin: bool,
        verify_calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockProvider {
        fn new(verify: Reply, profile: Reply) -> Self {
            Self {
                verify_reply: Mutex::new(verify),
                profile_reply: Mutex::new(profile),
                is_admin: true,
                verify_calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn set_verify(&self, reply: Reply) {
            *self.verify_reply.lock().unwrap() = reply;
        }

        fn calls(&self) -> usize {
            self.verify_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for MockProvider {
        async fn verify_token(&self, token: &str) -> Result<VerifiedUser, IdentityError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            let reply = *self.verify_reply.lock().unwrap();
            match reply {
                Reply::Ok => Ok(VerifiedUser {
                    id: token.trim_start_matches("token-").to_string(),
                    email: Some("owner@acme.co.za".into()),
                }),
                Reply::Invalid => Err(IdentityError::InvalidToken("jwt expired".into())),
                Reply::Transient => Err(IdentityError::Transient("Failed to fetch".into())),
                Reply::Hang => futures::future::pending().await,
            }
        }

        async fn load_profile(&self, _user_id: &str) -> Result<ProfileSnapshot, IdentityError> {
            let reply = *self.profile_reply.lock().unwrap();
            match reply {
                Reply::Ok => Ok(ProfileSnapshot {
                    is_admin: self.is_admin,
                    company_name: Some("Acme Civils".into()),
                    full_name: Some("Thandi Nkosi".into()),
                    tier: SubscriptionTier::Pro,
                }),
                Reply::Hang => futures::future::pending().await,
                _ => Err(IdentityError::Transient("profile fetch failed".into())),
            }
        }
    }

    fn session(user: &str) -> Session {
        Session::new(user, format!("token-{user}"))
    }

    fn manager(provider: Arc<MockProvider>, clock: &ManualClock) -> (SessionManager, ResilientStorage) {
        let storage = ResilientStorage::in_memory();
        let manager = SessionManager::new(provider, storage.clone(), Arc::new(clock.clone()));
        (manager, storage)
    }

    fn persist(storage: &ResilientStorage, session: &Session) {
        storage.set(SESSION_STORAGE_KEY, &serde_json::to_string(session).unwrap());
    }

    #[tokio::test]
    async fn test_no_persisted_session_is_unauthenticated() {
        let clock = ManualClock::new();
        let (mgr, _) = manager(Arc::new(MockProvider::new(Reply::Ok, Reply::Ok)), &clock);
        assert_eq!(mgr.initialize().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_valid_session_authenticates_and_loads_profile() {
        let clock = ManualClock::new();
        let (mgr, storage) = manager(Arc::new(MockProvider::new(Reply::Ok, Reply::Ok)), &clock);
        persist(&storage, &session("u1"));

        assert_eq!(mgr.initialize().await, AuthState::Authenticated);
        let snap = mgr.snapshot();
        assert_eq!(snap.admin, AdminStatus::Admin);
        assert_eq!(snap.tier, SubscriptionTier::Pro);
        assert_eq!(snap.company_name.as_deref(), Some("Acme Civils"));
    }

    #[tokio::test]
    async fn test_invalid_token_clears_persisted_session() {
        let clock = ManualClock::new();
        let (mgr, storage) = manager(Arc::new(MockProvider::new(Reply::Invalid, Reply::Ok)), &clock);
        persist(&storage, &session("u1"));

        assert_eq!(mgr.initialize().await, AuthState::Unauthenticated);
        assert_eq!(storage.get(SESSION_STORAGE_KEY), None);
        assert_eq!(mgr.snapshot().session, None);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_session_limited() {
        let clock = ManualClock::new();
        let (mgr, storage) = manager(Arc::new(MockProvider::new(Reply::Transient, Reply::Ok)), &clock);
        persist(&storage, &session("u1"));

        assert_eq!(mgr.initialize().await, AuthState::Limited);
        assert_eq!(mgr.snapshot().session, Some(session("u1")));
        assert!(storage.get(SESSION_STORAGE_KEY).is_some());
    }

    #[tokio::test]
    async fn test_verify_timeout_never_downgrades_admin() {
        let clock = ManualClock::new();
        let provider = Arc::new(MockProvider::new(Reply::Ok, Reply::Ok));
        let (mgr, storage) = manager(provider.clone(), &clock);
        persist(&storage, &session("u1"));
        assert_eq!(mgr.initialize().await, AuthState::Authenticated);
        assert_eq!(mgr.snapshot().admin, AdminStatus::Admin);

        provider.set_verify(Reply::Hang);
        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.reverify().await })
        };
        clock.wait_for_sleepers(1).await;
        clock.advance(Duration::from_secs(10));

        assert_eq!(task.await.unwrap(), AuthState::Limited);
        assert_eq!(mgr.snapshot().admin, AdminStatus::Admin);
    }

    #[tokio::test]
    async fn test_profile_timeout_keeps_previous_values() {
        let clock = ManualClock::new();
        let (mgr, storage) = manager(Arc::new(MockProvider::new(Reply::Ok, Reply::Hang)), &clock);
        persist(&storage, &session("u1"));

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.initialize().await })
        };
        clock.wait_for_sleepers(1).await;
        clock.advance(Duration::from_secs(15));

        assert_eq!(task.await.unwrap(), AuthState::Authenticated);
        let snap = mgr.snapshot();
        assert_eq!(snap.admin, AdminStatus::Unknown);
        assert_eq!(snap.tier, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn test_confirmed_profile_marks_not_admin() {
        let clock = ManualClock::new();
        let mut provider = MockProvider::new(Reply::Ok, Reply::Ok);
        provider.is_admin = false;
        let (mgr, storage) = manager(Arc::new(provider), &clock);
        persist(&storage, &session("u1"));

        mgr.initialize().await;
        assert_eq!(mgr.snapshot().admin, AdminStatus::NotAdmin);
    }

    #[tokio::test]
    async fn test_verified_user_is_not_rechecked() {
        let clock = ManualClock::new();
        let provider = Arc::new(MockProvider::new(Reply::Ok, Reply::Ok));
        let (mgr, storage) = manager(provider.clone(), &clock);
        persist(&storage, &session("u1"));

        mgr.initialize().await;
        mgr.verify().await;
        mgr.verify().await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_verification() {
        let clock = ManualClock::new();
        let gate = Arc::new(Semaphore::new(0));
        let mut provider = MockProvider::new(Reply::Ok, Reply::Ok);
        provider.gate = Some(gate.clone());
        let provider = Arc::new(provider);
        let (mgr, storage) = manager(provider.clone(), &clock);
        persist(&storage, &session("u1"));
        mgr.restore();

        let first = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.verify().await })
        };
        let second = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.verify().await })
        };
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);

        assert_eq!(first.await.unwrap(), AuthState::Authenticated);
        assert_eq!(second.await.unwrap(), AuthState::Authenticated);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_resets_everything() {
        let clock = ManualClock::new();
        let (mgr, storage) = manager(Arc::new(MockProvider::new(Reply::Ok, Reply::Ok)), &clock);
        persist(&storage, &session("u1"));
        mgr.initialize().await;

        assert!(matches!(mgr.on_event(AuthEvent::SignedOut), Ok(EventOutcome::SignedOut)));
        let snap = mgr.snapshot();
        assert_eq!(snap.state, AuthState::Unauthenticated);
        assert_eq!(snap.admin, AdminStatus::Unknown);
        assert_eq!(snap.tier, SubscriptionTier::Free);
        assert_eq!(snap.company_name, None);
        assert_eq!(storage.get(SESSION_STORAGE_KEY), None);
    }

    #[tokio::test]
    async fn test_token_refresh_does_not_reverify() {
        let clock = ManualClock::new();
        let provider = Arc::new(MockProvider::new(Reply::Ok, Reply::Ok));
        let (mgr, _) = manager(provider.clone(), &clock);

        let mut refreshed = session("u1");
        refreshed.access_token = "token-u1-rotated".into();
        assert!(matches!(
            mgr.on_event(AuthEvent::TokenRefreshed(refreshed.clone())),
            Ok(EventOutcome::Updated)
        ));
        assert_eq!(provider.calls(), 0);
        assert_eq!(mgr.snapshot().session, Some(refreshed));
    }

    #[tokio::test]
    async fn test_signed_in_verifies_in_background() {
        let clock = ManualClock::new();
        let provider = Arc::new(MockProvider::new(Reply::Ok, Reply::Ok));
        let (mgr, storage) = manager(provider.clone(), &clock);

        let outcome = mgr.on_event(AuthEvent::SignedIn(session("u2"))).unwrap();
        let EventOutcome::Verifying(handle) = outcome else {
            panic!("expected background verification");
        };
        assert_eq!(handle.await.unwrap(), AuthState::Authenticated);
        assert!(storage.get(SESSION_STORAGE_KEY).is_some());

        // Same user again is already verified
        assert!(matches!(
            mgr.on_event(AuthEvent::SignedIn(session("u2"))),
            Ok(EventOutcome::Updated)
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_event_flood_detaches_listener() {
        let clock = ManualClock::new();
        let (mgr, _) = manager(Arc::new(MockProvider::new(Reply::Ok, Reply::Ok)), &clock);

        for _ in 0..9 {
            mgr.on_event(AuthEvent::TokenRefreshed(session("u1"))).unwrap();
            clock.advance(Duration::from_millis(100));
        }
        assert!(matches!(
            mgr.on_event(AuthEvent::TokenRefreshed(session("u1"))),
            Err(SessionError::ListenerDetached)
        ));
        assert!(!mgr.listener_attached());
    }

    #[tokio::test]
    async fn test_sign_out_during_verification_discards_result() {
        let clock = ManualClock::new();
        let gate = Arc::new(Semaphore::new(0));
        let mut provider = MockProvider::new(Reply::Ok, Reply::Ok);
        provider.gate = Some(gate.clone());
        let provider = Arc::new(provider);
        let (mgr, storage) = manager(provider.clone(), &clock);
        persist(&storage, &session("u1"));
        mgr.restore();

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.verify().await })
        };
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }
        mgr.sign_out();
        gate.add_permits(1);

        assert_eq!(task.await.unwrap(), AuthState::Unauthenticated);
        assert_eq!(mgr.snapshot().session, None);
    }
}
