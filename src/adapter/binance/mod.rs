//! Binance USDⓈ-M perpetual futures.

pub mod client;
pub mod dto;
pub mod market;
pub mod private;
pub mod signer;

pub use client::BinanceClient;
pub use market::BinanceMarketProtocol;
pub use private::BinancePrivateStream;
pub use signer::BinanceSigner;
