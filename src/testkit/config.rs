//! Canonical test configurations with short timings.

use std::sync::Arc;

use crate::config::{
    ClockConfig, ConnectionConfig, ExchangeConfig, HttpConfig, RateLimitConfig, RetryConfig,
};
use crate::domain::Platform;
use crate::infrastructure::{ClockSync, RateLimiterRegistry, RetryExecutor, Services};

/// Reconnects within tens of milliseconds and gives up after five attempts.
#[must_use]
pub fn fast_connection() -> ConnectionConfig {
    ConnectionConfig {
        ping_interval_ms: 200,
        pong_timeout_ms: 2000,
        reconnect_delay_ms: 20,
        max_reconnect_delay_ms: 200,
        max_reconnects: 5,
        buffer_size: 100,
        connect_timeout_ms: 2000,
    }
}

/// Retries without meaningful backoff.
#[must_use]
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        multiplier: 2.0,
    }
}

/// Services wired with [`fast_connection`] and [`fast_retry`].
#[must_use]
pub fn services() -> Arc<Services> {
    Arc::new(Services {
        rate_limits: RateLimiterRegistry::new(RateLimitConfig::default()),
        clock: ClockSync::new(&ClockConfig::default()),
        retry: RetryExecutor::new(fast_retry()),
        http: HttpConfig {
            timeout_ms: 2000,
            connect_timeout_ms: 1000,
        },
        connection: fast_connection(),
    })
}

/// Account on `platform` whose REST calls go to `rest_url`.
#[must_use]
pub fn account(platform: Platform, rest_url: &str) -> ExchangeConfig {
    ExchangeConfig::new(platform.as_str(), platform, "test-key", "test-secret")
        .with_passphrase("test-passphrase")
        .with_rest_url(rest_url)
}
