//! Token-bucket request throttling.
//!
//! A [`RateLimiter`] refills continuously at `rate` tokens per second up to
//! `burst`. Callers that find the bucket empty reserve a future token under the
//! lock, release it, and sleep outside it, so waiters are spaced exactly
//! `1 / rate` apart and never stall each other on the mutex.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::{BucketConfig, RateLimitConfig};
use crate::domain::Platform;
use crate::error::{Error, Result};

struct Bucket {
    /// May go negative while reservations are outstanding.
    tokens: f64,
    last: Instant,
}

/// Token bucket with a bounded wait.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    max_wait: Duration,
    state: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket.
    ///
    /// # Arguments
    ///
    /// * `rate` - Tokens added per second
    /// * `burst` - Bucket capacity
    /// * `max_wait` - Longest [`wait`](Self::wait) may block
    #[must_use]
    pub fn new(rate: f64, burst: u32, max_wait: Duration) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            burst,
            max_wait,
            state: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn from_config(bucket: BucketConfig, max_wait: Duration) -> Self {
        Self::new(bucket.rate, bucket.burst, max_wait)
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last = now;
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.state.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait for a token.
    ///
    /// Dropping the returned future before it completes gives the reserved
    /// token back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimitExceeded`] without waiting when the token would
    /// not be available within the configured maximum wait.
    pub async fn wait(&self) -> Result<()> {
        let delay = {
            let mut bucket = self.state.lock();
            self.refill(&mut bucket);
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return Ok(());
            }
            let delay = Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate);
            if delay > self.max_wait {
                warn!(
                    needed_ms = delay.as_millis() as u64,
                    max_wait_ms = self.max_wait.as_millis() as u64,
                    "Rate limit wait exceeds maximum"
                );
                return Err(Error::RateLimitExceeded {
                    needed_ms: delay.as_millis() as u64,
                    max_wait_ms: self.max_wait.as_millis() as u64,
                });
            }
            bucket.tokens -= 1.0;
            delay
        };

        debug!(delay_ms = delay.as_millis() as u64, "Waiting for rate limit token");
        let mut reservation = Reservation {
            limiter: self,
            armed: true,
        };
        sleep(delay).await;
        reservation.armed = false;
        Ok(())
    }

    /// Tokens currently available (negative while waiters hold reservations).
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.state.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }
}

/// Returns a reserved token when a waiter is cancelled mid-sleep.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut bucket = self.limiter.state.lock();
            bucket.tokens = (bucket.tokens + 1.0).min(self.limiter.burst);
        }
    }
}

/// One limiter per venue, created on first use from [`RateLimitConfig`].
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    limiters: DashMap<Platform, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: DashMap::new(),
        }
    }

    /// Shared limiter for `platform`.
    #[must_use]
    pub fn get(&self, platform: Platform) -> Arc<RateLimiter> {
        self.limiters
            .entry(platform)
            .or_insert_with(|| {
                Arc::new(RateLimiter::from_config(
                    self.config.bucket_for(platform),
                    self.config.max_wait(),
                ))
            })
            .clone()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_spacing() {
        let limiter = Arc::new(RateLimiter::new(10.0, 20, Duration::from_secs(5)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.wait().await.unwrap();
                start.elapsed()
            }));
        }

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        let immediate = elapsed.iter().filter(|d| d.is_zero()).count();
        assert_eq!(immediate, 20);
        for (i, d) in elapsed[20..].iter().enumerate() {
            let expected = Duration::from_millis(100 * (i as u64 + 1));
            assert!(*d + Duration::from_millis(2) >= expected, "waiter {i} at {d:?}");
            assert!(*d <= expected + Duration::from_millis(5), "waiter {i} at {d:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_is_non_blocking() {
        let limiter = RateLimiter::new(1.0, 2, Duration::from_secs(5));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_beyond_max_fails_fast() {
        let limiter = RateLimiter::new(1.0, 1, Duration::from_millis(500));
        limiter.wait().await.unwrap();

        let start = Instant::now();
        let result = limiter.wait().await;
        assert!(matches!(result, Err(Error::RateLimitExceeded { .. })));
        assert!(start.elapsed().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_clamped_to_burst() {
        let limiter = RateLimiter::new(100.0, 3, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!((limiter.available() - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_token() {
        let limiter = RateLimiter::new(10.0, 1, Duration::from_secs(5));
        limiter.wait().await.unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), limiter.wait()).await;
        assert!(cancelled.is_err());
        // only the elapsed 10ms worth of refill remains consumed
        assert!(limiter.available() > -0.01);
    }

    #[test]
    fn test_registry_shares_per_venue() {
        let registry = RateLimiterRegistry::default();
        let a = registry.get(Platform::Okx);
        let b = registry.get(Platform::Okx);
        let c = registry.get(Platform::Gate);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
