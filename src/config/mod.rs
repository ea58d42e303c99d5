//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. Account secrets may be supplied
//! through environment variables (see [`ExchangeConfig::apply_env_overrides`])
//! so they never have to live in the file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::domain::Platform;
use crate::error::{ConfigError, Result};

mod account;
mod logging;
mod network;

pub use account::{ExchangeConfig, ProxyConfig};
pub use logging::LoggingConfig;
pub use network::{
    BucketConfig, ClockConfig, ConnectionConfig, HttpConfig, RateLimitConfig, RetryConfig,
};

/// Public market data to stream from the binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub intervals: Vec<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub accounts: Vec<ExchangeConfig>,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse TOML content, apply environment overrides and validate.
    #[allow(clippy::result_large_err)]
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.rate_limit.fill_venue_defaults();
        for account in &mut config.accounts {
            account.apply_env_overrides();
        }

        config.validate()?;

        Ok(config)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !seen.insert(account.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "accounts.id",
                    reason: format!("duplicate account id '{}'", account.id),
                }
                .into());
            }
        }
        if self.rate_limit.default.rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.default.rate",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.connection.buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connection.buffer_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn account(&self, id: &str) -> Option<&ExchangeConfig> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
