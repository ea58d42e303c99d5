//! Bitget v2 public futures channels.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::PRODUCT_TYPE;
use crate::adapter::de::{self, parse_decimal, parse_int};
use crate::adapter::session_stream::ArgFrame;
use crate::adapter::{kline_close_time, lower_interval, upper_interval};
use crate::domain::{Kline, Platform, SymbolFormat, Ticker};
use crate::infrastructure::{Channel, Heartbeat, MarketMessage, MarketProtocol, Subscription};

pub const PUBLIC_WS_URL: &str = "wss://ws.bitget.com/v2/ws/public";

const CANDLE_PREFIX: &str = "candle";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerPush {
    inst_id: String,
    #[serde(default, deserialize_with = "de::decimal")]
    last_pr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    bid_pr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    ask_pr: Decimal,
    #[serde(default, rename = "high24h", deserialize_with = "de::decimal")]
    high_24h: Decimal,
    #[serde(default, rename = "low24h", deserialize_with = "de::decimal")]
    low_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    base_volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    quote_volume: Decimal,
    #[serde(default, rename = "change24h", deserialize_with = "de::decimal")]
    change_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    mark_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    index_price: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    ts: i64,
}

pub struct BitgetMarketProtocol {
    url: String,
}

impl BitgetMarketProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(PUBLIC_WS_URL)
    }

    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn subscription(channel: String, symbol: &str) -> Subscription {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let arg = json!({"instType": PRODUCT_TYPE, "channel": channel, "instId": native});
        Subscription {
            key: format!("{channel}:{native}"),
            subscribe: json!({"op": "subscribe", "args": [arg]}).to_string(),
            unsubscribe: json!({"op": "unsubscribe", "args": [arg]}).to_string(),
        }
    }
}

impl Default for BitgetMarketProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketProtocol for BitgetMarketProtocol {
    fn platform(&self) -> Platform {
        Platform::Bitget
    }

    fn endpoint(&self, _channel: Channel) -> String {
        self.url.clone()
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Text("ping".into())
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }

    /// The ticker channel already carries mark and index prices.
    fn ticker_subscriptions(&self, symbol: &str) -> Vec<Subscription> {
        vec![Self::subscription("ticker".into(), symbol)]
    }

    fn kline_subscription(&self, symbol: &str, interval: &str) -> Subscription {
        Self::subscription(format!("{CANDLE_PREFIX}{}", upper_interval(interval)), symbol)
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

        if arg.channel == "ticker" {
            return frame
                .data
                .iter()
                .filter_map(|item| serde_json::from_value::<TickerPush>(item.clone()).ok())
                .map(|t| {
                    MarketMessage::Ticker(Ticker {
                        symbol: SymbolFormat::from_venue(&t.inst_id),
                        last_price: t.last_pr,
                        mark_price: t.mark_price,
                        index_price: t.index_price,
                        bid_price: t.bid_pr,
                        ask_price: t.ask_pr,
                        high_24h: t.high_24h,
                        low_24h: t.low_24h,
                        volume_24h: t.base_volume,
                        quote_volume_24h: t.quote_volume,
                        change_24h: t.change_24h * Decimal::ONE_HUNDRED,
                        timestamp: t.ts,
                    })
                })
                .collect();
        }

        if let Some(venue_interval) = arg.channel.strip_prefix(CANDLE_PREFIX) {
            let interval = lower_interval(venue_interval);
            let symbol = frame.symbol();
            return frame
                .data
                .iter()
                .filter_map(Value::as_array)
                .filter(|row| row.len() >= 6)
                .map(|row| {
                    let open_time = parse_int(&row[0]);
                    MarketMessage::Kline {
                        symbol: symbol.clone(),
                        interval: interval.clone(),
                        kline: Kline {
                            open_time,
                            open: parse_decimal(&row[1]),
                            high: parse_decimal(&row[2]),
                            low: parse_decimal(&row[3]),
                            close: parse_decimal(&row[4]),
                            volume: parse_decimal(&row[5]),
                            close_time: kline_close_time(open_time, &interval),
                        },
                    }
                })
                .collect();
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscription_frames() {
        let protocol = BitgetMarketProtocol::new();
        let subs = protocol.ticker_subscriptions("BTC/USDT");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].key, "ticker:BTCUSDT");
        let frame: Value = serde_json::from_str(&subs[0].subscribe).unwrap();
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"][0]["instType"], "USDT-FUTURES");
        assert_eq!(frame["args"][0]["instId"], "BTCUSDT");

        let kline = protocol.kline_subscription("ETHUSDT", "1h");
        assert_eq!(kline.key, "candle1H:ETHUSDT");
        assert!(kline.unsubscribe.contains(r#""op":"unsubscribe""#));
    }

    #[test]
    fn test_decode_ticker_and_candle() {
        let protocol = BitgetMarketProtocol::new();
        let ticker = protocol.decode(
            r#"{"action":"snapshot","arg":{"instType":"USDT-FUTURES","channel":"ticker","instId":"BTCUSDT"},
                "data":[{"instId":"BTCUSDT","lastPr":"50000","markPrice":"50001","indexPrice":"50002",
                "change24h":"-0.01","ts":"1700000000000"}],"ts":1700000000001}"#,
        );
        let MarketMessage::Ticker(t) = &ticker[0] else {
            panic!("expected ticker");
        };
        assert_eq!(t.mark_price, dec!(50001));
        assert_eq!(t.change_24h, dec!(-1));

        let candles = protocol.decode(
            r#"{"action":"update","arg":{"instType":"USDT-FUTURES","channel":"candle1H","instId":"BTCUSDT"},
                "data":[["3600000","1","2","0.5","1.5","100","150"]],"ts":1}"#,
        );
        let MarketMessage::Kline { symbol, interval, kline } = &candles[0] else {
            panic!("expected kline");
        };
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(interval, "1h");
        assert_eq!(kline.close_time, 7_199_999);
    }

    #[test]
    fn test_control_frames_ignored() {
        let protocol = BitgetMarketProtocol::new();
        assert!(protocol.decode("pong").is_empty());
        assert!(protocol
            .decode(r#"{"event":"subscribe","arg":{"instType":"USDT-FUTURES","channel":"ticker","instId":"BTCUSDT"}}"#)
            .is_empty());
    }
}
