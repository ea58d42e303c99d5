//! OKX v5 public channels.
//!
//! Tickers and mark prices live on the public endpoint, candles on the
//! business endpoint, so the two channel kinds use separate connections.

use std::time::Duration;

use serde_json::{json, Value};

use super::client::{klines_from, ticker_from};
use super::dto::{MarkPriceEntry, TickerEntry};
use crate::adapter::session_stream::ArgFrame;
use crate::adapter::{lower_interval, upper_interval};
use crate::domain::{Platform, SymbolFormat};
use crate::infrastructure::{Channel, Heartbeat, MarketMessage, MarketProtocol, Subscription};

pub const PUBLIC_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
pub const BUSINESS_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/business";

const CANDLE_PREFIX: &str = "candle";

pub struct OkxMarketProtocol {
    public_url: String,
    business_url: String,
}

impl OkxMarketProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self::with_urls(PUBLIC_WS_URL, BUSINESS_WS_URL)
    }

    #[must_use]
    pub fn with_urls(public_url: impl Into<String>, business_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            business_url: business_url.into(),
        }
    }

    fn subscription(channel: &str, symbol: &str) -> Subscription {
        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        let arg = json!({"channel": channel, "instId": inst_id});
        Subscription {
            key: format!("{channel}:{inst_id}"),
            subscribe: json!({"op": "subscribe", "args": [arg]}).to_string(),
            unsubscribe: json!({"op": "unsubscribe", "args": [arg]}).to_string(),
        }
    }
}

impl Default for OkxMarketProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketProtocol for OkxMarketProtocol {
    fn platform(&self) -> Platform {
        Platform::Okx
    }

    fn endpoint(&self, channel: Channel) -> String {
        match channel {
            Channel::Ticker => self.public_url.clone(),
            Channel::Kline => self.business_url.clone(),
        }
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Text("ping".into())
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }

    fn ticker_subscriptions(&self, symbol: &str) -> Vec<Subscription> {
        vec![
            Self::subscription("tickers", symbol),
            Self::subscription("mark-price", symbol),
        ]
    }

    fn kline_subscription(&self, symbol: &str, interval: &str) -> Subscription {
        Self::subscription(&format!("{CANDLE_PREFIX}{}", upper_interval(interval)), symbol)
    }

    fn decode(&self, text: &str) -> Vec<MarketMessage> {
        let Ok(frame) = serde_json::from_str::<ArgFrame>(text) else {
            return Vec::new();
        };
        if frame.event.is_some() {
            return Vec::new();
        }
        let Some(arg) = &frame.arg else {
            return Vec::new();
        };

        match arg.channel.as_str() {
            "tickers" => frame
                .data
                .iter()
                .filter_map(|item| serde_json::from_value::<TickerEntry>(item.clone()).ok())
                .map(|raw| MarketMessage::Ticker(ticker_from(raw)))
                .collect(),
            "mark-price" => frame
                .data
                .iter()
                .filter_map(|item| serde_json::from_value::<MarkPriceEntry>(item.clone()).ok())
                .map(|raw| MarketMessage::MarkPrice {
                    symbol: SymbolFormat::from_venue(&raw.inst_id),
                    mark_price: raw.mark_px,
                    index_price: rust_decimal::Decimal::ZERO,
                    timestamp: raw.ts,
                })
                .collect(),
            channel => {
                let Some(bar) = channel.strip_prefix(CANDLE_PREFIX) else {
                    return Vec::new();
                };
                let interval = lower_interval(bar);
                let symbol = frame.symbol();
                let rows: Vec<Vec<Value>> = frame
                    .data
                    .iter()
                    .filter_map(|row| row.as_array().cloned())
                    .collect();
                klines_from(&rows, &interval)
                    .into_iter()
                    .map(|kline| MarketMessage::Kline {
                        symbol: symbol.clone(),
                        interval: interval.clone(),
                        kline,
                    })
                    .collect()
            }
        }
    }
}
