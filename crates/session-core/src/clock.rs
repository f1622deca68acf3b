//! Time source used for every timeout in the session layer

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Monotonic time plus a sleep primitive. Production code uses [`TokioClock`];
/// tests drive [`ManualClock`] by hand.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// A clock that only moves when [`ManualClock::advance`] is called
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<watch::Sender<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Duration::ZERO);
        Self { now: Arc::new(tx) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.send_modify(|now| *now += by);
    }

    /// Number of sleeps currently waiting on this clock
    pub fn sleepers(&self) -> usize {
        self.now.receiver_count()
    }

    /// Yield until at least `count` sleeps are registered
    pub async fn wait_for_sleepers(&self, count: usize) {
        while self.sleepers() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.borrow()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let mut rx = self.now.subscribe();
        let deadline = *rx.borrow() + duration;
        Box::pin(async move {
            while *rx.borrow_and_update() < deadline {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Race `future` against `limit` on `clock`
pub async fn with_timeout<F>(clock: &dyn Clock, limit: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let timer = clock.sleep(limit);
    tokio::select! {
        biased;
        output = future => Ok(output),
        _ = timer => Err(Elapsed(limit)),
    }
}

/// Race `future` against `limit`, yielding `fallback` when the timer wins
pub async fn with_fallback<F>(clock: &dyn Clock, limit: Duration, future: F, fallback: F::Output) -> F::Output
where
    F: Future,
{
    with_timeout(clock, limit, future).await.unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_completes_after_advance() {
        let clock = ManualClock::new();
        let sleeper = tokio::spawn(clock.sleep(Duration::from_secs(5)));

        clock.wait_for_sleepers(1).await;
        clock.advance(Duration::from_secs(4));
        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::from_secs(1));
        sleeper.await.unwrap();
        assert_eq!(clock.now(), Duration::from_secs(5));
    }

    #[test]
    fn test_with_timeout_prefers_ready_future() {
        let clock = ManualClock::new();
        let out = tokio_test::block_on(with_timeout(&clock, Duration::ZERO, async { 7 }));
        assert_eq!(out, Ok(7));
    }

    #[test]
    fn test_elapsed_clock_times_out_pending_work() {
        let clock = ManualClock::new();
        let out = tokio_test::block_on(with_timeout(
            &clock,
            Duration::ZERO,
            futures::future::pending::<u32>(),
        ));
        assert_eq!(out, Err(Elapsed(Duration::ZERO)));
    }

    #[tokio::test]
    async fn test_with_fallback_on_timeout() {
        let clock = ManualClock::new();
        let task = {
            let clock = clock.clone();
            tokio::spawn(async move {
                with_fallback(&clock, Duration::from_secs(8), futures::future::pending::<u32>(), 408).await
            })
        };
        clock.wait_for_sleepers(1).await;
        clock.advance(Duration::from_secs(8));
        assert_eq!(task.await.unwrap(), 408);
    }
}
