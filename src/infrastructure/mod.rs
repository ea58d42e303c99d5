//! Transport, throttling and resilience building blocks shared by every venue.

pub mod clock;
pub mod connection;
pub mod http;
pub mod market_stream;
pub mod rate_limit;
pub mod rest;
pub mod retry;
pub mod services;
pub mod session;
pub mod sign;

pub use clock::ClockSync;
pub use connection::{ConnectionManager, ConnectionState, Heartbeat};
pub use http::{HttpRequest, HttpTransport};
pub use market_stream::{Channel, MarketMessage, MarketProtocol, PublicMarketStream, Subscription};
pub use rate_limit::{RateLimiter, RateLimiterRegistry};
pub use rest::RestClient;
pub use retry::RetryExecutor;
pub use services::Services;
pub use session::Session;
