//! Auth-state events and listener flood protection

use std::collections::VecDeque;
use std::time::Duration;

use crate::identity::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession(Option<Session>),
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialSession(_) => "INITIAL_SESSION",
            Self::SignedIn(_) => "SIGNED_IN",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
            Self::SignedOut => "SIGNED_OUT",
        }
    }
}

/// Trips once `limit` events land inside `window`. A tripped guard stays tripped.
#[derive(Debug, Clone)]
pub struct FloodGuard {
    window: Duration,
    limit: usize,
    recent: VecDeque<Duration>,
    tripped: bool,
}

impl FloodGuard {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            window,
            limit: limit.max(1),
            recent: VecDeque::with_capacity(limit),
            tripped: false,
        }
    }

    /// Record an event at `now`; returns false when the listener must detach
    pub fn record(&mut self, now: Duration) -> bool {
        if self.tripped {
            return false;
        }
        self.recent.push_back(now);
        if self.recent.len() > self.limit {
            self.recent.pop_front();
        }
        if self.recent.len() == self.limit {
            if let Some(first) = self.recent.front() {
                if now.saturating_sub(*first) < self.window {
                    self.tripped = true;
                }
            }
        }
        !self.tripped
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_on_tenth_event_inside_window() {
        let mut guard = FloodGuard::new(10, Duration::from_secs(2));
        for i in 0..9 {
            assert!(guard.record(Duration::from_millis(i * 100)));
        }
        assert!(!guard.record(Duration::from_millis(900)));
        assert!(guard.is_tripped());
        assert!(!guard.record(Duration::from_secs(60)));
    }

    #[test]
    fn test_spread_out_events_do_not_trip() {
        let mut guard = FloodGuard::new(10, Duration::from_secs(2));
        for i in 0..50 {
            assert!(guard.record(Duration::from_millis(i * 250)));
        }
    }
}
