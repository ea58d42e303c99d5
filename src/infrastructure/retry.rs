//! Retry with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Message fragments that indicate a transport-level hiccup.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "no such host",
    "dns error",
    "failed to lookup address",
    "eof",
    "network is unreachable",
    "network unreachable",
    "temporary failure",
    "broken pipe",
];

/// Runs an operation until it succeeds, fails permanently or runs out of
/// attempts.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `err` is worth another attempt.
    ///
    /// IP bans and credential failures are never retried, even when their
    /// message happens to look transient.
    #[must_use]
    pub fn is_retryable(err: &Error) -> bool {
        match err {
            Error::Retryable(_) => true,
            Error::Api(api) if api.is_critical() => false,
            Error::Api(api) => api.is_rate_limit(),
            Error::Http(e) if e.is_timeout() || e.is_connect() => true,
            Error::Validation(_) | Error::Cancelled | Error::Config(_) | Error::Fatal(_) => false,
            other => {
                let message = other.to_string().to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| message.contains(p))
            }
        }
    }

    /// Backoff before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.config.multiplier.max(1.0).powi(retry.min(32) as i32);
        let millis = (self.config.base_delay_ms as f64 * factor) as u64;
        Duration::from_millis(millis.min(self.config.max_delay_ms))
    }

    /// Run `op` with retries.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error unchanged, or
    /// [`Error::RetriesExhausted`] wrapping the last error after
    /// `max_retries + 1` attempts.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(op, None).await
    }

    /// Like [`execute`](Self::execute) but gives up with [`Error::Cancelled`]
    /// as soon as `shutdown` flips to `true` while waiting between attempts.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus [`Error::Cancelled`].
    pub async fn execute_until<T, F, Fut>(
        &self,
        op: F,
        shutdown: watch::Receiver<bool>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(op, Some(shutdown)).await
    }

    async fn run<T, F, Fut>(&self, mut op: F, mut shutdown: Option<watch::Receiver<bool>>) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                return Err(Error::Cancelled);
            }

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !Self::is_retryable(&err) {
                debug!(attempt, error = %err, "Non-retryable error");
                return Err(err);
            }
            if attempt == attempts {
                warn!(attempts, error = %err, "Retries exhausted");
                return Err(Error::RetriesExhausted {
                    attempts,
                    source: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt - 1);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );

            match shutdown.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        () = sleep(delay) => {}
                        changed = rx.changed() => {
                            if changed.is_err() || *rx.borrow() {
                                return Err(Error::Cancelled);
                            }
                        }
                    }
                }
                None => sleep(delay).await,
            }
        }

        Err(Error::Cancelled)
    }
}
