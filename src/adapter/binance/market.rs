//! Binance public futures streams.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::de;
use crate::domain::{Kline, Platform, SymbolFormat, Ticker};
use crate::infrastructure::{Channel, Heartbeat, MarketMessage, MarketProtocol, Subscription};

pub const PUBLIC_WS_URL: &str = "wss://fstream.binance.com/ws";
pub const TESTNET_PUBLIC_WS_URL: &str = "wss://stream.binancefuture.com/ws";

/// Raw stream frames keyed by their `e` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum StreamFrame {
    #[serde(rename = "24hrTicker")]
    Ticker(TickerFrame),
    #[serde(rename = "markPriceUpdate")]
    MarkPrice(MarkPriceFrame),
    #[serde(rename = "kline")]
    Kline(KlineFrame),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TickerFrame {
    #[serde(rename = "E", default)]
    event_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c", deserialize_with = "de::decimal")]
    last: Decimal,
    #[serde(rename = "P", default, deserialize_with = "de::decimal")]
    change_percent: Decimal,
    #[serde(rename = "h", default, deserialize_with = "de::decimal")]
    high: Decimal,
    #[serde(rename = "l", default, deserialize_with = "de::decimal")]
    low: Decimal,
    #[serde(rename = "v", default, deserialize_with = "de::decimal")]
    volume: Decimal,
    #[serde(rename = "q", default, deserialize_with = "de::decimal")]
    quote_volume: Decimal,
}

#[derive(Debug, Deserialize)]
struct MarkPriceFrame {
    #[serde(rename = "E", default)]
    event_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p", deserialize_with = "de::decimal")]
    mark: Decimal,
    #[serde(rename = "i", default, deserialize_with = "de::decimal")]
    index: Decimal,
}

#[derive(Debug, Deserialize)]
struct KlineFrame {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    bar: KlineBar,
}

#[derive(Debug, Deserialize)]
struct KlineBar {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o", deserialize_with = "de::decimal")]
    open: Decimal,
    #[serde(rename = "h", deserialize_with = "de::decimal")]
    high: Decimal,
    #[serde(rename = "l", deserialize_with = "de::decimal")]
    low: Decimal,
    #[serde(rename = "c", deserialize_with = "de::decimal")]
    close: Decimal,
    #[serde(rename = "v", deserialize_with = "de::decimal")]
    volume: Decimal,
}

pub struct BinanceMarketProtocol {
    url: String,
}

impl BinanceMarketProtocol {
    #[must_use]
    pub fn new(testnet: bool) -> Self {
        let url = if testnet {
            TESTNET_PUBLIC_WS_URL
        } else {
            PUBLIC_WS_URL
        };
        Self::with_url(url)
    }

    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn subscription(stream: String) -> Subscription {
        Subscription {
            subscribe: json!({"method": "SUBSCRIBE", "params": [stream], "id": 1}).to_string(),
            unsubscribe: json!({"method": "UNSUBSCRIBE", "params": [stream], "id": 2})
                .to_string(),
            key: stream,
        }
    }
}

impl MarketProtocol for BinanceMarketProtocol {
    fn platform(&self) -> Platform {
        Platform::Binance
    }

    fn endpoint(&self, _channel: Channel) -> String {
        self.url.clone()
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Ping
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(180)
    }

    fn ticker_subscriptions(&self, symbol: &str) -> Vec<Subscription> {
        let stream = SymbolFormat::to_venue(Platform::Binance, symbol).to_lowercase();
        vec![
            Self::subscription(format!("{stream}@ticker")),
            Self::subscription(format!("{stream}@markPrice@1s")),
        ]
    }

    fn kline_subscription(&self, symbol: &str, interval: &str) -> Subscription {
        let stream = SymbolFormat::to_venue(Platform::Binance, symbol).to_lowercase();
        Self::subscription(format!("{stream}@kline_{interval}"))
    }

    fn decode(&self, text: &str) -> Vec<MarketMessage> {
        let Ok(frame) = serde_json::from_str::<StreamFrame>(text) else {
            return Vec::new();
        };
        let message = match frame {
            StreamFrame::Ticker(t) => MarketMessage::Ticker(Ticker {
                symbol: SymbolFormat::from_venue(&t.symbol),
                last_price: t.last,
                high_24h: t.high,
                low_24h: t.low,
                volume_24h: t.volume,
                quote_volume_24h: t.quote_volume,
                change_24h: t.change_percent,
                timestamp: t.event_time,
                ..Ticker::default()
            }),
            StreamFrame::MarkPrice(m) => MarketMessage::MarkPrice {
                symbol: SymbolFormat::from_venue(&m.symbol),
                mark_price: m.mark,
                index_price: m.index,
                timestamp: m.event_time,
            },
            StreamFrame::Kline(k) => MarketMessage::Kline {
                symbol: SymbolFormat::from_venue(&k.symbol),
                interval: k.bar.interval,
                kline: Kline {
                    open_time: k.bar.open_time,
                    open: k.bar.open,
                    high: k.bar.high,
                    low: k.bar.low,
                    close: k.bar.close,
                    volume: k.bar.volume,
                    close_time: k.bar.close_time,
                },
            },
            StreamFrame::Other => return Vec::new(),
        };
        vec![message]
    }
}
