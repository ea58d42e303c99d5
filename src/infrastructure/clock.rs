//! Server clock offset tracking for signed requests.
//!
//! Each (venue, credential) pair keeps its own offset so that one drifting
//! account never skews another. Signed timestamps are always
//! `local time + offset`.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClockConfig;
use crate::domain::{now_ms, Platform};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Offset {
    /// Server minus local, in milliseconds.
    millis: i64,
    synced_at: Instant,
}

/// Registry of clock offsets keyed by venue and API key.
pub struct ClockSync {
    refresh_interval: Duration,
    offsets: DashMap<(Platform, String), Offset>,
}

impl ClockSync {
    #[must_use]
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            offsets: DashMap::new(),
        }
    }

    fn key(platform: Platform, credential: &str) -> (Platform, String) {
        (platform, credential.to_string())
    }

    /// Current offset in milliseconds; zero before the first sync.
    #[must_use]
    pub fn offset(&self, platform: Platform, credential: &str) -> i64 {
        self.offsets
            .get(&Self::key(platform, credential))
            .map_or(0, |o| o.millis)
    }

    /// Timestamp to sign with, in unix milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self, platform: Platform, credential: &str) -> i64 {
        now_ms() + self.offset(platform, credential)
    }

    #[must_use]
    pub fn needs_sync(&self, platform: Platform, credential: &str) -> bool {
        self.offsets
            .get(&Self::key(platform, credential))
            .map_or(true, |o| o.synced_at.elapsed() >= self.refresh_interval)
    }

    pub fn set_offset(&self, platform: Platform, credential: &str, millis: i64) {
        self.offsets.insert(
            Self::key(platform, credential),
            Offset {
                millis,
                synced_at: Instant::now(),
            },
        );
    }

    /// Forget the offset so the next signed request resyncs first.
    pub fn invalidate(&self, platform: Platform, credential: &str) {
        self.offsets.remove(&Self::key(platform, credential));
    }

    /// Fetch the server time and store the new offset.
    ///
    /// The local reference is the midpoint of the round trip.
    ///
    /// # Errors
    ///
    /// Propagates the failure of `server_time`; the previous offset is kept.
    pub async fn sync<F, Fut>(&self, platform: Platform, credential: &str, server_time: F) -> Result<i64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64>>,
    {
        let before = now_ms();
        let server = server_time().await?;
        let after = now_ms();
        let offset = server - (before + after) / 2;

        self.set_offset(platform, credential, offset);
        info!(platform = %platform, offset_ms = offset, "Clock synchronized");
        Ok(offset)
    }

    /// Sync when the offset is missing or stale.
    ///
    /// A failed sync is logged and the last known offset stays in use.
    pub async fn ensure_synced<F, Fut>(&self, platform: Platform, credential: &str, server_time: F) -> i64
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64>>,
    {
        if !self.needs_sync(platform, credential) {
            return self.offset(platform, credential);
        }
        match self.sync(platform, credential, server_time).await {
            Ok(offset) => offset,
            Err(e) => {
                warn!(platform = %platform, error = %e, "Clock sync failed, keeping previous offset");
                self.offset(platform, credential)
            }
        }
    }

    /// Run a signed request, resyncing and retrying exactly once when the venue
    /// rejects its timestamp. A second rejection is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn retry_on_expired<T, S, SFut, Op, OpFut>(
        &self,
        platform: Platform,
        credential: &str,
        server_time: S,
        mut op: Op,
    ) -> Result<T>
    where
        S: FnOnce() -> SFut,
        SFut: Future<Output = Result<i64>>,
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<T>>,
    {
        match op().await {
            Err(e) if e.is_timestamp_expired() => {
                warn!(platform = %platform, error = %e, "Timestamp rejected, resyncing clock");
                if let Err(sync_err) = self.sync(platform, credential, server_time).await {
                    debug!(error = %sync_err, "Resync failed");
                    return Err(e);
                }
                match op().await {
                    Err(e) if e.is_timestamp_expired() => {
                        warn!(platform = %platform, error = %e, "Timestamp rejected after resync");
                        Err(Error::fatal(e))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new(&ClockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::ApiError;

    fn expired() -> Error {
        Error::Api(ApiError::new(
            Platform::Binance,
            400,
            "-1021",
            "Timestamp for this request is outside of the recvWindow.",
        ))
    }

    #[tokio::test]
    async fn test_sync_sets_offset_per_credential() {
        let clock = ClockSync::default();
        let server = now_ms() + 5_000;

        let offset = clock
            .sync(Platform::Okx, "key-a", || async move { Ok(server) })
            .await
            .unwrap();

        assert!((4_900..=5_100).contains(&offset), "offset {offset}");
        assert_eq!(clock.offset(Platform::Okx, "key-b"), 0);
        assert!(!clock.needs_sync(Platform::Okx, "key-a"));
        assert!(clock.needs_sync(Platform::Okx, "key-b"));

        let ts = clock.timestamp_ms(Platform::Okx, "key-a");
        assert!((ts - now_ms() - offset).abs() < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_goes_stale() {
        let clock = ClockSync::default();
        clock.set_offset(Platform::Bitget, "k", -250);
        assert!(!clock.needs_sync(Platform::Bitget, "k"));

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(clock.needs_sync(Platform::Bitget, "k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sync_keeps_previous_offset() {
        let clock = ClockSync::default();
        clock.set_offset(Platform::Gate, "k", 42);
        tokio::time::advance(Duration::from_secs(700)).await;

        let offset = clock
            .ensure_synced(Platform::Gate, "k", || async {
                Err(Error::Connection("refused".into()))
            })
            .await;
        assert_eq!(offset, 42);
    }

    #[tokio::test]
    async fn test_one_expiry_retried_once() {
        let clock = ClockSync::default();
        let calls = AtomicU32::new(0);
        let syncs = AtomicU32::new(0);

        let result = clock
            .retry_on_expired(
                Platform::Binance,
                "k",
                || async {
                    syncs.fetch_add(1, Ordering::SeqCst);
                    Ok(now_ms())
                },
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(expired())
                    } else {
                        Ok("filled")
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), "filled");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_expiry_surfaced() {
        let clock = ClockSync::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = clock
            .retry_on_expired(
                Platform::Binance,
                "k",
                || async { Ok(now_ms()) },
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(expired())
                },
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timestamp_expired());
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
