//! Bitget USDT-FUTURES adapter.

pub mod client;
pub mod dto;
pub mod market;
pub mod private;
pub mod signer;

pub use client::BitgetClient;
pub use market::BitgetMarketProtocol;
pub use private::{BitgetPrivateProtocol, BitgetPrivateStream};
pub use signer::BitgetSigner;
