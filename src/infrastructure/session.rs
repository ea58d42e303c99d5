//! One-shot account setup flags.
//!
//! Venues need some account state switched on before trading (hedge mode,
//! isolated margin per symbol, dual mode). [`Session::ensure`] runs such a
//! step at most once per key; concurrent callers wait for the first one, and
//! a failed step is attempted again by the next caller.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;

#[derive(Default)]
pub struct Session {
    steps: DashMap<String, Arc<OnceCell<()>>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` unless `key` already completed.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`; the key stays unset so a later call retries.
    pub async fn ensure<F, Fut>(&self, key: &str, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let cell = self
            .steps
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if cell.initialized() {
            return Ok(());
        }
        cell.get_or_try_init(|| async {
            debug!(step = key, "Running one-shot setup");
            op().await
        })
        .await?;
        Ok(())
    }

    #[must_use]
    pub fn is_done(&self, key: &str) -> bool {
        self.steps.get(key).is_some_and(|cell| cell.initialized())
    }

    /// Forget a completed step.
    pub fn reset(&self, key: &str) {
        self.steps.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::Error;

    #[tokio::test]
    async fn test_runs_once() {
        let session = Session::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            session
                .ensure("hedge_mode", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.is_done("hedge_mode"));
        assert!(!session.is_done("margin:BTCUSDT"));
    }

    #[tokio::test]
    async fn test_failure_is_retried() {
        let session = Session::new();
        let calls = AtomicU32::new(0);

        let first = session
            .ensure("dual_mode", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Connection("reset".into()))
            })
            .await;
        assert!(first.is_err());
        assert!(!session.is_done("dual_mode"));

        session
            .ensure("dual_mode", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let session = Arc::new(Session::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                session
                    .ensure("margin:ETHUSDT", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
