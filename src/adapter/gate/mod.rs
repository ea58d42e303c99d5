//! Gate v4 USDT-settled futures adapter.

pub mod client;
pub mod dto;
pub mod market;
pub mod private;
pub mod signer;

pub use client::GateClient;
pub use market::GateMarketProtocol;
pub use private::{GatePrivateProtocol, GatePrivateStream};
pub use signer::GateSigner;
