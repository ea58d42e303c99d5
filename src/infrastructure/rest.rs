//! Throttled, retrying REST client for one venue.

use std::sync::Arc;

use tracing::debug;

use super::{HttpRequest, HttpTransport, RateLimiter, RetryExecutor, Services};
use crate::config::ExchangeConfig;
use crate::domain::Platform;
use crate::error::Result;

/// Wraps an [`HttpTransport`] with the venue rate limiter and retry policy.
///
/// Only idempotent (GET) requests are retried on transient failures: a
/// replayed order placement could open a second position.
pub struct RestClient {
    transport: HttpTransport,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
}

impl RestClient {
    #[must_use]
    pub fn new(transport: HttpTransport, limiter: Arc<RateLimiter>, retry: RetryExecutor) -> Self {
        Self {
            transport,
            limiter,
            retry,
        }
    }

    /// Client for `account`, using `default_url` unless the account overrides it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn for_account(
        account: &ExchangeConfig,
        default_url: &str,
        services: &Services,
    ) -> Result<Self> {
        let base_url = account.rest_url.as_deref().unwrap_or(default_url);
        let transport = HttpTransport::new(
            account.platform,
            base_url,
            &services.http,
            account.proxy.as_ref(),
        )?;
        Ok(Self::new(
            transport,
            services.rate_limits.get(account.platform),
            services.retry.clone(),
        ))
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.transport.platform()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Send one request under the venue rate limit.
    ///
    /// # Errors
    ///
    /// Returns the venue or transport error, wrapped in
    /// [`Error::RetriesExhausted`](crate::error::Error::RetriesExhausted) when
    /// a GET ran out of attempts.
    pub async fn send(&self, request: &HttpRequest) -> Result<String> {
        if request.is_idempotent() {
            self.retry
                .execute(|| async {
                    self.limiter.wait().await?;
                    self.transport.send(request).await
                })
                .await
        } else {
            debug!(
                platform = %self.platform(),
                method = %request.method,
                path = %request.path,
                "Sending non-idempotent request"
            );
            self.limiter.wait().await?;
            self.transport.send(request).await
        }
    }
}
