//! Shared registries injected into every adapter.

use std::sync::Arc;

use super::{ClockSync, RateLimiterRegistry, RetryExecutor};
use crate::config::{Config, ConnectionConfig, HttpConfig};

/// Process-wide state owned by the application context.
///
/// Rate limiters are per venue, clock offsets per credential; both are
/// shared by every client built from the same `Services`.
pub struct Services {
    pub rate_limits: RateLimiterRegistry,
    pub clock: ClockSync,
    pub retry: RetryExecutor,
    pub http: HttpConfig,
    pub connection: ConnectionConfig,
}

impl Services {
    #[must_use]
    pub fn from_config(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            rate_limits: RateLimiterRegistry::new(config.rate_limit.clone()),
            clock: ClockSync::new(&config.clock),
            retry: RetryExecutor::new(config.retry.clone()),
            http: config.http.clone(),
            connection: config.connection.clone(),
        })
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            rate_limits: RateLimiterRegistry::default(),
            clock: ClockSync::default(),
            retry: RetryExecutor::default(),
            http: HttpConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}
