//! Per-client sliding window admission control.
//!
//! Each client identity owns a bucket of timestamps of billable requests.
//! Timestamps older than the window are pruned lazily whenever the bucket is
//! touched. Admission and recording are split so that only successful work
//! consumes quota; [`QuotaReservation`] ties the two together atomically for
//! concurrent callers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::clock::{Clock, SystemClock};

/// Configuration for the sliding window limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum billable requests per client inside one window
    pub max_requests: u32,
    /// Length of the sliding window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(300),
        }
    }
}

/// Recorded timestamps plus slots held by in-flight reservations.
#[derive(Debug, Default)]
struct ClientBucket {
    timestamps: VecDeque<Instant>,
    pending: u32,
}

impl ClientBucket {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn used(&self) -> usize {
        self.timestamps.len() + self.pending as usize
    }

    fn is_idle(&self) -> bool {
        self.timestamps.is_empty() && self.pending == 0
    }
}

/// Sliding window rate limiter keyed by client identity.
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<String, ClientBucket>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, ClientBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if `client` still has quota left in the current window.
    ///
    /// Prunes expired timestamps but never records anything.
    pub fn admit(&self, client: &str) -> bool {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        let Some(bucket) = buckets.get_mut(client) else {
            return self.config.max_requests > 0;
        };

        bucket.prune(now, self.config.window);
        let allowed = bucket.used() < self.config.max_requests as usize;
        if bucket.is_idle() {
            buckets.remove(client);
        }
        allowed
    }

    /// Bills one request to `client` at the current time.
    pub fn record(&self, client: &str) {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        let bucket = buckets.entry(client.to_string()).or_default();
        bucket.prune(now, self.config.window);
        bucket.timestamps.push_back(now);
    }

    /// Admits `client` and holds one slot until the reservation is committed
    /// or dropped.
    ///
    /// Check and hold happen under the same lock, so two concurrent requests
    /// from one client can never both take the last slot.
    pub fn reserve(self: &Arc<Self>, client: &str) -> Option<QuotaReservation> {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        let bucket = buckets.entry(client.to_string()).or_default();
        bucket.prune(now, self.config.window);

        if bucket.used() >= self.config.max_requests as usize {
            if bucket.is_idle() {
                buckets.remove(client);
            }
            return None;
        }

        bucket.pending += 1;
        Some(QuotaReservation {
            limiter: Arc::clone(self),
            client: client.to_string(),
            settled: false,
        })
    }

    /// Time until `client` gets a slot back, or `None` if it has quota now.
    pub fn retry_after(&self, client: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        let bucket = buckets.get_mut(client)?;
        bucket.prune(now, self.config.window);

        if bucket.used() < self.config.max_requests as usize {
            return None;
        }

        let wait = bucket
            .timestamps
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(self.config.window);
        Some(wait.max(Duration::from_secs(1)))
    }

    /// Number of billed requests currently inside the window for `client`.
    pub fn usage(&self, client: &str) -> usize {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        match buckets.get_mut(client) {
            Some(bucket) => {
                bucket.prune(now, self.config.window);
                bucket.timestamps.len()
            }
            None => 0,
        }
    }

    fn settle(&self, client: &str, bill: bool) {
        let now = self.clock.now();
        let mut buckets = self.lock_buckets();
        let bucket = buckets.entry(client.to_string()).or_default();
        bucket.pending = bucket.pending.saturating_sub(1);
        bucket.prune(now, self.config.window);
        if bill {
            bucket.timestamps.push_back(now);
        }
        if bucket.is_idle() {
            buckets.remove(client);
        }
    }
}

/// A held admission slot.
///
/// [`commit`](Self::commit) bills the request; dropping the reservation
/// without committing gives the slot back.
#[must_use = "dropping a reservation releases the slot without billing it"]
pub struct QuotaReservation {
    limiter: Arc<SlidingWindowRateLimiter>,
    client: String,
    settled: bool,
}

impl QuotaReservation {
    pub fn commit(mut self) {
        self.settled = true;
        self.limiter.settle(&self.client, true);
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.settle(&self.client, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::ManualClock;

    fn limiter_with_clock(
        max_requests: u32,
        window_secs: u64,
    ) -> (Arc<SlidingWindowRateLimiter>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = SlidingWindowRateLimiter::with_clock(
            RateLimitConfig {
                max_requests,
                window: Duration::from_secs(window_secs),
            },
            clock.clone(),
        );
        (Arc::new(limiter), clock)
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let (limiter, _clock) = limiter_with_clock(5, 300);

        for _ in 0..5 {
            assert!(limiter.admit("10.0.0.1"));
            limiter.record("10.0.0.1");
        }

        assert!(!limiter.admit("10.0.0.1"));
    }

    #[test]
    fn test_window_expiry_restores_quota() {
        let (limiter, clock) = limiter_with_clock(5, 300);

        for _ in 0..5 {
            assert!(limiter.admit("10.0.0.1"));
            limiter.record("10.0.0.1");
        }
        assert!(!limiter.admit("10.0.0.1"));

        clock.advance(Duration::from_secs(299));
        assert!(!limiter.admit("10.0.0.1"));

        clock.advance(Duration::from_secs(1));
        assert!(limiter.admit("10.0.0.1"));
        assert_eq!(limiter.usage("10.0.0.1"), 0);
    }

    #[test]
    fn test_sliding_window_frees_slots_one_at_a_time() {
        let (limiter, clock) = limiter_with_clock(2, 60);

        limiter.record("client");
        clock.advance(Duration::from_secs(30));
        limiter.record("client");
        assert!(!limiter.admit("client"));

        // The first record expires, the second is still inside the window
        clock.advance(Duration::from_secs(30));
        assert!(limiter.admit("client"));
        assert_eq!(limiter.usage("client"), 1);
    }

    #[test]
    fn test_admit_does_not_consume_quota() {
        let (limiter, _clock) = limiter_with_clock(2, 300);

        // A failed job never calls record
        for _ in 0..10 {
            assert!(limiter.admit("client"));
        }
        assert_eq!(limiter.usage("client"), 0);

        limiter.record("client");
        limiter.record("client");
        assert!(!limiter.admit("client"));
    }

    #[test]
    fn test_clients_are_isolated() {
        let (limiter, _clock) = limiter_with_clock(1, 300);

        limiter.record("a");
        assert!(!limiter.admit("a"));
        assert!(limiter.admit("b"));
    }

    #[test]
    fn test_reservation_commit_bills_request() {
        let (limiter, _clock) = limiter_with_clock(2, 300);

        limiter.reserve("client").unwrap().commit();
        assert_eq!(limiter.usage("client"), 1);

        limiter.reserve("client").unwrap().commit();
        assert!(limiter.reserve("client").is_none());
        assert!(!limiter.admit("client"));
    }

    #[test]
    fn test_dropped_reservation_releases_slot() {
        let (limiter, _clock) = limiter_with_clock(1, 300);

        let reservation = limiter.reserve("client").unwrap();
        assert!(limiter.reserve("client").is_none());
        assert!(!limiter.admit("client"));

        drop(reservation);
        assert!(limiter.admit("client"));
        assert_eq!(limiter.usage("client"), 0);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_limit() {
        let (limiter, _clock) = limiter_with_clock(5, 300);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || match limiter.reserve("same-client") {
                    Some(reservation) => {
                        reservation.commit();
                        true
                    }
                    None => false,
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();

        assert_eq!(admitted, 5);
        assert_eq!(limiter.usage("same-client"), 5);
    }

    #[test]
    fn test_retry_after() {
        let (limiter, clock) = limiter_with_clock(1, 300);

        assert!(limiter.retry_after("client").is_none());

        limiter.record("client");
        clock.advance(Duration::from_secs(100));

        assert_eq!(limiter.retry_after("client"), Some(Duration::from_secs(200)));
    }

    #[test]
    fn test_zero_limit_rejects_everyone() {
        let (limiter, _clock) = limiter_with_clock(0, 300);
        assert!(!limiter.admit("client"));
        assert!(limiter.reserve("client").is_none());
    }
}
