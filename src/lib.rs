//! derivlink - unified REST and WebSocket connectivity for USDT-margined
//! perpetual futures.
//!
//! One [`port::ExchangeClient`] trait covers balances, market data, positions
//! and orders on Binance, Bitget, OKX and Gate. Every adapter speaks canonical
//! symbols (`BTCUSDT`) and base-asset quantities, converting to venue symbols
//! and contract counts at its boundary, and operates accounts in hedge mode
//! with isolated margin.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment overrides for secrets
//! - [`domain`] - Venue-agnostic types: orders, positions, tickers, symbols
//! - [`error`] - Error types, including the classified venue [`error::ApiError`]
//! - [`infrastructure`] - Rate limiting, retries, clock sync, signing and the
//!   reconnecting socket shared by every venue
//! - [`port`] - Traits consumers depend on
//! - [`adapter`] - Binance, Bitget, OKX and Gate implementations
//! - [`app`] - Per-account client registry
//!
//! # Features
//!
//! - `testkit` - In-process HTTP and WebSocket servers for integration tests
//!
//! # Example
//!
//! ```no_run
//! use derivlink::app::ExchangeManager;
//! use derivlink::config::Config;
//!
//! # async fn run() -> derivlink::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let manager = ExchangeManager::from_config(&config);
//! let client = manager.get_exchange("main")?;
//! let ticker = client.get_ticker("BTC/USDT").await?;
//! println!("{} {}", ticker.symbol, ticker.effective_mark_price());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
