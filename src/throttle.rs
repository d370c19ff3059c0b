//! Minimum-interval throttling of outbound requests.
//!
//! The remote service allows 3 requests/second without an API key and 10
//! with one. [`RateLimiter`] enforces the gap between the *completion* of one
//! request and the *dispatch* of the next.
//!
//! The read-check-wait-record cycle is one critical section. A caller obtains
//! a [`ThrottleGuard`] from [`RateLimiter::wait_if_needed`], keeps it alive for
//! the duration of its network call, and the guard stamps the completion time
//! when dropped. A second caller therefore cannot observe a stale timestamp
//! while the first request is still in flight. Cache hits never reach the
//! limiter and are never blocked by it.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Interval without an API key (3 requests/second).
pub const ANONYMOUS_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 3);

/// Interval with an API key (10 requests/second).
pub const KEYED_INTERVAL: Duration = Duration::from_millis(100);

/// Enforces a minimum interval between outbound requests.
///
/// # Examples
///
/// ```
/// use eutils::throttle::{RateLimiter, KEYED_INTERVAL};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = RateLimiter::for_credential(true);
/// assert_eq!(limiter.interval(), KEYED_INTERVAL);
///
/// let guard = limiter.wait_if_needed(false).await;
/// assert!(guard.is_some());
/// // ... issue the request while holding `guard` ...
/// drop(guard);
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    // `None` until the first non-skipped request completes.
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with an explicit interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Selects the interval from whether an API credential is configured.
    pub fn for_credential(has_api_key: bool) -> Self {
        if has_api_key {
            Self::new(KEYED_INTERVAL)
        } else {
            Self::new(ANONYMOUS_INTERVAL)
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next request may be dispatched.
    ///
    /// With `skip = true` this returns `None` immediately and neither reads
    /// nor updates the limiter state. Otherwise it sleeps for whatever is
    /// left of the interval and returns a guard that records the completion
    /// time when dropped. Concurrent callers queue on the guard.
    pub async fn wait_if_needed(&self, skip: bool) -> Option<ThrottleGuard<'_>> {
        if skip {
            return None;
        }

        let state = self.last_request.lock().await;
        if let Some(last) = *state {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!(sleep_ms = wait.as_secs_f64() * 1000.0, "throttling request");
                tokio::time::sleep(wait).await;
            }
        }

        Some(ThrottleGuard { state })
    }

    /// Completion time of the last non-skipped request, if any.
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

/// Exclusive access to the limiter for the duration of one request.
///
/// Dropping the guard records the current instant as the completion time,
/// whether the request succeeded or not.
#[derive(Debug)]
pub struct ThrottleGuard<'a> {
    state: MutexGuard<'a, Option<Instant>>,
}

impl Drop for ThrottleGuard<'_> {
    fn drop(&mut self) {
        *self.state = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn interval_depends_on_credential() {
        assert_eq!(RateLimiter::for_credential(false).interval(), ANONYMOUS_INTERVAL);
        assert_eq!(RateLimiter::for_credential(true).interval(), KEYED_INTERVAL);
        assert!(KEYED_INTERVAL < ANONYMOUS_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_never_waits() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        let guard = limiter.wait_if_needed(false).await;
        assert!(guard.is_some());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(1));

        drop(limiter.wait_if_needed(false).await);
        let completed = Instant::now();

        let _guard = limiter.wait_if_needed(false).await;
        assert!(completed.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_wait_after_elapsed_time() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        drop(limiter.wait_if_needed(false).await);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let start = Instant::now();
        drop(limiter.wait_if_needed(false).await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(400));
        assert!(waited < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_neither_waits_nor_records() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        drop(limiter.wait_if_needed(false).await);
        let recorded = limiter.last_request().await;

        let start = Instant::now();
        assert!(limiter.wait_if_needed(true).await.is_none());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.last_request().await, recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
        let mut handles = Vec::new();

        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let guard = limiter.wait_if_needed(false).await;
                let dispatched = Instant::now();
                // Simulated network latency while holding the guard.
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(guard);
                dispatched
            }));
        }

        let mut dispatched = Vec::new();
        for handle in handles {
            dispatched.push(handle.await.unwrap());
        }
        dispatched.sort();

        for pair in dispatched.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(550));
        }
    }
}
