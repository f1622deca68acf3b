//! Session and identity reconciliation
//!
//! An explicit state machine over an [`IdentityProvider`], with every timeout
//! driven by an injected [`Clock`] and the session persisted through
//! [`ResilientStorage`].

pub mod clock;
pub mod events;
pub mod identity;
pub mod manager;
pub mod storage;

pub use clock::{with_fallback, with_timeout, Clock, Elapsed, ManualClock, TokioClock};
pub use events::{AuthEvent, FloodGuard};
pub use identity::{IdentityError, IdentityProvider, ProfileSnapshot, Session, VerifiedUser};
pub use manager::{
    AdminStatus, AuthSnapshot, AuthState, EventOutcome, SessionConfig, SessionError, SessionManager,
    SESSION_STORAGE_KEY,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, ResilientStorage, StorageError};
