//! Venue adapters and the factories that pick one per platform.

pub mod binance;
pub mod bitget;
pub mod de;
pub mod gate;
pub mod okx;
pub mod session_stream;

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::config::ExchangeConfig;
use crate::domain::{OrderSide, Platform, PositionSide, PrivateEvent};
use crate::error::{Error, Result};
use crate::infrastructure::{MarketProtocol, Services};
use crate::port::{EventHandler, ExchangeClient, PrivateStream};

pub use binance::{BinanceClient, BinanceMarketProtocol, BinancePrivateStream};
pub use bitget::{BitgetClient, BitgetMarketProtocol, BitgetPrivateStream};
pub use gate::{GateClient, GateMarketProtocol, GatePrivateStream};
pub use okx::{OkxClient, OkxMarketProtocol, OkxPrivateStream};

/// Build the REST client for `account`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_client(
    account: &ExchangeConfig,
    services: Arc<Services>,
) -> Result<Arc<dyn ExchangeClient>> {
    let client: Arc<dyn ExchangeClient> = match account.platform {
        Platform::Binance => Arc::new(BinanceClient::new(account, services)?),
        Platform::Bitget => Arc::new(BitgetClient::new(account, services)?),
        Platform::Okx => Arc::new(OkxClient::new(account, services)?),
        Platform::Gate => Arc::new(GateClient::new(account, services)?),
    };
    Ok(client)
}

/// Build the private push stream for `account`. The stream is not started.
///
/// # Errors
///
/// Returns an error if the REST client backing the stream cannot be built.
pub fn create_private_stream(
    account: &ExchangeConfig,
    services: Arc<Services>,
) -> Result<Arc<dyn PrivateStream>> {
    let stream: Arc<dyn PrivateStream> = match account.platform {
        Platform::Binance => {
            let config = services.connection.clone();
            let client = Arc::new(BinanceClient::new(account, services)?);
            Arc::new(BinancePrivateStream::new(client, account, config))
        }
        Platform::Bitget => Arc::new(BitgetPrivateStream::for_account(account, &services)),
        Platform::Okx => Arc::new(OkxPrivateStream::for_account(account, &services)),
        Platform::Gate => Arc::new(GatePrivateStream::for_account(account, &services)),
    };
    Ok(stream)
}

/// Public wire protocol for `platform`.
#[must_use]
pub fn market_protocol(platform: Platform, testnet: bool) -> Arc<dyn MarketProtocol> {
    match platform {
        Platform::Binance => Arc::new(BinanceMarketProtocol::new(testnet)),
        Platform::Bitget => Arc::new(BitgetMarketProtocol::new()),
        Platform::Okx => Arc::new(OkxMarketProtocol::new()),
        Platform::Gate => Arc::new(GateMarketProtocol::new()),
    }
}

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

/// Plain decimal string without trailing zeros or exponent.
pub(crate) fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn parse_side(raw: &str) -> Result<OrderSide> {
    raw.parse().map_err(Error::Parse)
}

pub(crate) fn position_not_found(symbol: &str, side: PositionSide) -> Error {
    Error::Validation(format!("no open {side} position for {symbol}"))
}

/// `1h` -> `1H`, `1d` -> `1D`, `1w` -> `1W`; minutes and months unchanged.
pub(crate) fn upper_interval(interval: &str) -> String {
    let interval = interval.trim();
    match interval.chars().last() {
        Some('h' | 'd' | 'w') => interval.to_uppercase(),
        _ => interval.to_string(),
    }
}

/// Inverse of [`upper_interval`]: `1H` -> `1h`.
pub(crate) fn lower_interval(interval: &str) -> String {
    let interval = interval.trim();
    match interval.chars().last() {
        Some('H' | 'D' | 'W') => interval.to_lowercase(),
        _ => interval.to_string(),
    }
}

/// Close time of a bar opening at `open_time`: the last millisecond before
/// the next bar.
pub(crate) fn kline_close_time(open_time: i64, interval: &str) -> i64 {
    crate::domain::market::interval_millis(interval).map_or(open_time, |ms| open_time + ms - 1)
}

/// Holder for the user's private event callback.
#[derive(Default)]
pub(crate) struct EventSink {
    handler: RwLock<Option<EventHandler>>,
}

impl EventSink {
    pub(crate) fn set(&self, handler: EventHandler) {
        *self.handler.write() = Some(handler);
    }

    pub(crate) fn emit(&self, event: PrivateEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}
