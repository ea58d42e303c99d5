//! Per-account exchange credentials.

use std::fmt;

use serde::Deserialize;

use crate::domain::Platform;
use crate::error::{ConfigError, Result};

/// Outbound proxy for REST traffic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_enabled")]
    pub enabled: bool,
    /// `http` or `socks5`.
    #[serde(default = "default_proxy_kind", rename = "type")]
    pub kind: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

const fn default_proxy_enabled() -> bool {
    true
}

fn default_proxy_kind() -> String {
    "http".into()
}

impl ProxyConfig {
    /// Proxy URL, or `None` when disabled.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let scheme = if self.kind.eq_ignore_ascii_case("socks5") {
            "socks5h"
        } else {
            "http"
        };
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some(format!(
                "{scheme}://{user}:{pass}@{}:{}",
                self.host, self.port
            )),
            _ => Some(format!("{scheme}://{}:{}", self.host, self.port)),
        }
    }
}

/// Credentials and endpoints for one linked account.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Account id used as the cache key by the exchange manager.
    pub id: String,
    pub platform: Platform,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Required by Bitget and OKX.
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// REST base URL override.
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Private WebSocket URL override.
    #[serde(default)]
    pub private_ws_url: Option<String>,
}

impl ExchangeConfig {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        platform: Platform,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform,
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: String::new(),
            testnet: false,
            proxy: None,
            rest_url: None,
            private_ws_url: None,
        }
    }

    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    #[must_use]
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_private_ws_url(mut self, url: impl Into<String>) -> Self {
        self.private_ws_url = Some(url.into());
        self
    }

    /// Replace secrets from `DERIVLINK_<ID>_API_KEY`, `..._SECRET_KEY` and
    /// `..._PASSPHRASE` when set.
    pub fn apply_env_overrides(&mut self) {
        let prefix = env_prefix(&self.id);
        if let Ok(value) = std::env::var(format!("{prefix}_API_KEY")) {
            self.api_key = value;
        }
        if let Ok(value) = std::env::var(format!("{prefix}_SECRET_KEY")) {
            self.secret_key = value;
        }
        if let Ok(value) = std::env::var(format!("{prefix}_PASSPHRASE")) {
            self.passphrase = value;
        }
    }

    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "id" }.into());
        }
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingField { field: "api_key" }.into());
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingField { field: "secret_key" }.into());
        }
        if matches!(self.platform, Platform::Bitget | Platform::Okx) && self.passphrase.is_empty()
        {
            return Err(ConfigError::MissingField {
                field: "passphrase",
            }
            .into());
        }
        Ok(())
    }
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .field("testnet", &self.testnet)
            .field("proxy", &self.proxy.as_ref().map(|p| (&p.host, p.port)))
            .field("rest_url", &self.rest_url)
            .finish()
    }
}

fn env_prefix(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("DERIVLINK_{cleaned}")
}

fn redact(key: &str) -> String {
    if key.len() <= 6 {
        return "***".into();
    }
    let head: String = key.chars().take(4).collect();
    format!("{head}***")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_validate_requires_passphrase_for_okx() {
        let cfg = ExchangeConfig::new("acct-1", Platform::Okx, "k", "s");
        assert!(matches!(
            cfg.validate(),
            Err(Error::Config(ConfigError::MissingField {
                field: "passphrase"
            }))
        ));
        assert!(cfg.with_passphrase("p").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = ExchangeConfig::new("a", Platform::Binance, "ABCDEFGHIJ", "topsecret");
        let printed = format!("{cfg:?}");
        assert!(printed.contains("ABCD***"));
        assert!(!printed.contains("topsecret"));
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("main-okx"), "DERIVLINK_MAIN_OKX");
    }

    #[test]
    fn test_proxy_url() {
        let proxy = ProxyConfig {
            enabled: true,
            kind: "socks5".into(),
            host: "127.0.0.1".into(),
            port: 1080,
            username: None,
            password: None,
        };
        assert_eq!(proxy.url().as_deref(), Some("socks5h://127.0.0.1:1080"));

        let disabled = ProxyConfig {
            enabled: false,
            ..proxy
        };
        assert_eq!(disabled.url(), None);
    }
}
