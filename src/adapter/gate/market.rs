//! Gate v4 USDT futures public channels.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::{kline_from, ticker_from};
use super::dto::{Candle, TickerEntry};
use crate::adapter::de;
use crate::domain::{now_ms, Platform, SymbolFormat};
use crate::infrastructure::{Channel, Heartbeat, MarketMessage, MarketProtocol, Subscription};

pub const PUBLIC_WS_URL: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";

const TICKERS: &str = "futures.tickers";
const CANDLES: &str = "futures.candlesticks";

/// `{"time": .., "channel": .., "event": .., "error": .., "result": ..}`
/// envelope of every Gate socket frame. `result` is an array for most
/// pushes and an object for acknowledgements.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GateFrame {
    #[serde(default, deserialize_with = "de::int")]
    pub time_ms: i64,
    #[serde(default, deserialize_with = "de::int")]
    pub time: i64,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub result: Value,
}

impl GateFrame {
    /// Items of `result`, whether sent as an array or a single object.
    pub(crate) fn items(&self) -> Vec<&Value> {
        match &self.result {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&self.result],
            _ => Vec::new(),
        }
    }

    pub(crate) fn timestamp(&self) -> i64 {
        if self.time_ms > 0 {
            self.time_ms
        } else if self.time > 0 {
            self.time * 1000
        } else {
            now_ms()
        }
    }
}

pub struct GateMarketProtocol {
    url: String,
}

impl GateMarketProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(PUBLIC_WS_URL)
    }

    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn subscription(channel: &str, payload: Vec<String>) -> Subscription {
        let time = now_ms() / 1000;
        let frame = |event: &str| {
            json!({"time": time, "channel": channel, "event": event, "payload": payload})
                .to_string()
        };
        Subscription {
            key: format!("{channel}:{}", payload.join(",")),
            subscribe: frame("subscribe"),
            unsubscribe: frame("unsubscribe"),
        }
    }
}

impl Default for GateMarketProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketProtocol for GateMarketProtocol {
    fn platform(&self) -> Platform {
        Platform::Gate
    }

    fn endpoint(&self, _channel: Channel) -> String {
        self.url.clone()
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Ping
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(20)
    }

    /// Ticker pushes already carry mark and index prices.
    fn ticker_subscriptions(&self, symbol: &str) -> Vec<Subscription> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        vec![Self::subscription(TICKERS, vec![contract])]
    }

    fn kline_subscription(&self, symbol: &str, interval: &str) -> Subscription {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let interval = interval.trim().to_lowercase();
        Self::subscription(CANDLES, vec![interval, contract])
    }

    fn decode(&self, text: &str) -> Vec<MarketMessage> {
        let Ok(frame) = serde_json::from_str::<GateFrame>(text) else {
            return Vec::new();
        };
        if frame.event != "update" && frame.event != "all" {
            return Vec::new();
        }

        match frame.channel.as_str() {
            TICKERS => {
                let timestamp = frame.timestamp();
                frame
                    .items()
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<TickerEntry>(item.clone()).ok())
                    .map(|raw| MarketMessage::Ticker(ticker_from(raw, timestamp)))
                    .collect()
            }
            CANDLES => frame
                .items()
                .into_iter()
                .filter_map(|item| serde_json::from_value::<Candle>(item.clone()).ok())
                .filter_map(candle_message)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Pushes name interval and contract together (`1m_BTC_USDT`). Volume is
/// taken from the base-asset field, the contract count being meaningless
/// without the multiplier.
fn candle_message(raw: Candle) -> Option<MarketMessage> {
    let (interval, contract) = raw.n.split_once('_')?;
    let interval = interval.to_string();
    let symbol = SymbolFormat::from_venue(contract);
    let base_volume = raw.a;
    let mut kline = kline_from(raw, &interval, Decimal::ONE);
    if base_volume > Decimal::ZERO {
        kline.volume = base_volume;
    }
    Some(MarketMessage::Kline {
        symbol,
        interval,
        kline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscription_frames() {
        let protocol = GateMarketProtocol::new();
        let tickers = protocol.ticker_subscriptions("BTC/USDT");
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].key, "futures.tickers:BTC_USDT");

        let kline = protocol.kline_subscription("ETHUSDT", "1H");
        assert_eq!(kline.key, "futures.candlesticks:1h,ETH_USDT");
        let frame: Value = serde_json::from_str(&kline.subscribe).unwrap();
        assert_eq!(frame["event"], "subscribe");
        assert_eq!(frame["payload"], json!(["1h", "ETH_USDT"]));
        let frame: Value = serde_json::from_str(&kline.unsubscribe).unwrap();
        assert_eq!(frame["event"], "unsubscribe");
    }

    #[test]
    fn test_decode_ticker() {
        let messages = GateMarketProtocol::new().decode(
            r#"{"time":1700000000,"time_ms":1700000000123,"channel":"futures.tickers","event":"update",
                "result":[{"contract":"BTC_USDT","last":"50000.1","change_percentage":"1.25",
                "mark_price":"50001","index_price":"49999","volume_24h_base":"120",
                "volume_24h_quote":"6000000","high_24h":"51000","low_24h":"49000"}]}"#,
        );
        let MarketMessage::Ticker(ticker) = &messages[0] else {
            panic!("expected ticker");
        };
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.last_price, dec!(50000.1));
        assert_eq!(ticker.mark_price, dec!(50001));
        assert_eq!(ticker.change_24h, dec!(1.25));
        assert_eq!(ticker.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn test_decode_candle() {
        let messages = GateMarketProtocol::new().decode(
            r#"{"time":1700000000,"channel":"futures.candlesticks","event":"update",
                "result":[{"t":1699999980,"v":2000,"c":"50010","h":"50020","l":"49990",
                "o":"50000","n":"1m_BTC_USDT","a":"0.2"}]}"#,
        );
        let MarketMessage::Kline {
            symbol,
            interval,
            kline,
        } = &messages[0]
        else {
            panic!("expected kline");
        };
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(interval, "1m");
        assert_eq!(kline.open_time, 1_699_999_980_000);
        assert_eq!(kline.close_time, 1_700_000_039_999);
        assert_eq!(kline.volume, dec!(0.2));
    }

    #[test]
    fn test_acks_ignored() {
        let protocol = GateMarketProtocol::new();
        assert!(protocol
            .decode(r#"{"time":1,"channel":"futures.tickers","event":"subscribe","result":{"status":"success"}}"#)
            .is_empty());
        assert!(protocol.decode("not json").is_empty());
    }
}
