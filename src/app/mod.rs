//! Application layer: account registry and client lifecycle.

mod manager;

pub use manager::ExchangeManager;
