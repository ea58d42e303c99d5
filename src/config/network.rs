//! Throttling, retry, clock and connection settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::Platform;

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BucketConfig {
    /// Sustained requests per second.
    pub rate: f64,
    /// Maximum burst size.
    pub burst: u32,
}

impl BucketConfig {
    #[must_use]
    pub const fn new(rate: f64, burst: u32) -> Self {
        Self { rate, burst }
    }
}

/// Per-venue REST rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Longest a caller waits for a token before failing (milliseconds).
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Bucket used for venues without an explicit entry.
    #[serde(default = "default_bucket")]
    pub default: BucketConfig,
    #[serde(default = "default_venue_buckets")]
    pub venues: HashMap<Platform, BucketConfig>,
}

const fn default_max_wait_ms() -> u64 {
    5000
}

const fn default_bucket() -> BucketConfig {
    BucketConfig::new(10.0, 20)
}

fn default_venue_buckets() -> HashMap<Platform, BucketConfig> {
    HashMap::from([
        (Platform::Binance, BucketConfig::new(10.0, 50)),
        (Platform::Okx, BucketConfig::new(10.0, 30)),
        (Platform::Gate, BucketConfig::new(10.0, 30)),
    ])
}

impl RateLimitConfig {
    #[must_use]
    pub fn bucket_for(&self, platform: Platform) -> BucketConfig {
        self.venues.get(&platform).copied().unwrap_or(self.default)
    }

    /// Add built-in buckets for venues the file did not mention.
    pub fn fill_venue_defaults(&mut self) {
        for (platform, bucket) in default_venue_buckets() {
            self.venues.entry(platform).or_insert(bucket);
        }
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            default: default_bucket(),
            venues: default_venue_buckets(),
        }
    }
}

/// Backoff for transient REST failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    100
}

const fn default_retry_max_delay_ms() -> u64 {
    5000
}

const fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Streaming connection heartbeat and reconnection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Maximum silence after a ping before the socket is considered dead.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Base delay for reconnect backoff.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    /// Attempts before the connection gives up for good.
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
    /// Inbound queue capacity; the oldest message is dropped when full.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_ping_interval_ms() -> u64 {
    15_000
}

const fn default_pong_timeout_ms() -> u64 {
    10_000
}

const fn default_reconnect_delay_ms() -> u64 {
    1000
}

const fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

const fn default_max_reconnects() -> u32 {
    100
}

const fn default_buffer_size() -> usize {
    1000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = interval.as_millis() as u64;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnects: default_max_reconnects(),
            buffer_size: default_buffer_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Server clock offset tracking.
#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Offsets older than this are refreshed before the next signed request.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

const fn default_refresh_interval_secs() -> u64 {
    600
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// REST client timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_http_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_http_timeout_ms() -> u64 {
    15_000
}

const fn default_http_connect_timeout_ms() -> u64 {
    5000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            connect_timeout_ms: default_http_connect_timeout_ms(),
        }
    }
}
