//! Ports implemented by the venue adapters.
//!
//! Consumers (strategy engines, risk services, admin surfaces) depend only on
//! these traits and never on a concrete venue.

pub mod exchange;
pub mod stream;

pub use exchange::ExchangeClient;
pub use stream::{EventHandler, PrivateStream};
