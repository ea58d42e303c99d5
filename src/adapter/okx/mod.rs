//! OKX v5 USDT perpetual swap adapter.

pub mod client;
pub mod dto;
pub mod market;
pub mod private;
pub mod signer;

pub use client::OkxClient;
pub use market::OkxMarketProtocol;
pub use private::{OkxPrivateProtocol, OkxPrivateStream};
pub use signer::OkxSigner;
