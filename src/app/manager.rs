//! Per-account client cache.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::adapter::{create_client, create_private_stream, market_protocol};
use crate::config::{Config, ExchangeConfig};
use crate::domain::{Balance, Platform};
use crate::error::{Error, Result};
use crate::infrastructure::{PublicMarketStream, Services};
use crate::port::{ExchangeClient, PrivateStream};

/// Owns the linked accounts and lazily builds one [`ExchangeClient`] per
/// account id.
///
/// Clients share the manager's [`Services`], so every account on a venue draws
/// from the same rate limiter.
pub struct ExchangeManager {
    services: Arc<Services>,
    accounts: DashMap<String, ExchangeConfig>,
    clients: DashMap<String, Arc<dyn ExchangeClient>>,
}

impl ExchangeManager {
    #[must_use]
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            accounts: DashMap::new(),
            clients: DashMap::new(),
        }
    }

    /// Manager with every `[[accounts]]` entry registered.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let manager = Self::new(Services::from_config(config));
        for account in &config.accounts {
            manager.register(account.clone());
        }
        manager
    }

    #[must_use]
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Link an account. Replacing an existing id drops its cached client so
    /// the next call picks up the new credentials.
    pub fn register(&self, account: ExchangeConfig) {
        let id = account.id.clone();
        if let Some(previous) = self.accounts.insert(id.clone(), account) {
            if self.clients.remove(&id).is_some() {
                info!(account = %id, platform = %previous.platform, "Account replaced, client evicted");
            }
        }
    }

    #[must_use]
    pub fn account_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.accounts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn account(&self, id: &str) -> Option<ExchangeConfig> {
        self.accounts.get(id).map(|entry| entry.clone())
    }

    /// Cached client for `id`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown account id, or the
    /// adapter's construction error.
    pub fn get_exchange(&self, id: &str) -> Result<Arc<dyn ExchangeClient>> {
        if let Some(client) = self.clients.get(id) {
            return Ok(Arc::clone(client.value()));
        }
        let account = self
            .account(id)
            .ok_or_else(|| Error::Validation(format!("unknown account '{id}'")))?;

        let client = self
            .clients
            .entry(id.to_string())
            .or_try_insert_with(|| create_client(&account, Arc::clone(&self.services)))?;
        info!(account = %id, platform = %account.platform, "Exchange client created");
        Ok(Arc::clone(client.value()))
    }

    /// Evict the cached client; the account stays registered.
    pub fn remove_exchange(&self, id: &str) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Forget the account and its client.
    pub fn unregister(&self, id: &str) -> bool {
        self.clients.remove(id);
        self.accounts.remove(id).is_some()
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.clients.len()
    }

    /// Validate credentials end to end with one balance query.
    ///
    /// # Errors
    ///
    /// Returns the venue or transport error; [`Error::is_fatal`] tells a bad
    /// key apart from a transient failure.
    pub async fn test_connection(&self, id: &str) -> Result<Balance> {
        let client = self.get_exchange(id)?;
        match client.get_balance().await {
            Ok(balance) => {
                info!(
                    account = %id,
                    platform = %client.platform(),
                    total = %balance.total_balance,
                    available = %balance.available_balance,
                    "Connection test passed"
                );
                Ok(balance)
            }
            Err(e) => {
                warn!(account = %id, platform = %client.platform(), error = %e, fatal = e.is_fatal(), "Connection test failed");
                Err(e)
            }
        }
    }

    /// Private push stream for `id`. Not started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown account id.
    pub fn private_stream(&self, id: &str) -> Result<Arc<dyn PrivateStream>> {
        let account = self
            .account(id)
            .ok_or_else(|| Error::Validation(format!("unknown account '{id}'")))?;
        create_private_stream(&account, Arc::clone(&self.services))
    }

    /// Public market stream for `platform`, sharing the connection settings.
    #[must_use]
    pub fn market_stream(&self, platform: Platform, testnet: bool) -> PublicMarketStream {
        PublicMarketStream::new(
            market_protocol(platform, testnet),
            self.services.connection.clone(),
        )
    }
}
