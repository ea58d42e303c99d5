//! Gate v4 `futures/usdt` REST payloads.
//!
//! Gate replies with bare objects and arrays; failures carry a `label`.
//! Sizes are signed integer contract counts and times are unix seconds,
//! sometimes fractional.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::adapter::de;

#[derive(Debug, Deserialize)]
pub struct ServerTime {
    #[serde(deserialize_with = "de::int")]
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default, deserialize_with = "de::decimal")]
    pub total: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub available: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub unrealised_pnl: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub position_margin: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub order_margin: Decimal,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct TickerEntry {
    pub contract: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub last: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub highest_bid: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub lowest_ask: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub high_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub low_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub volume_24h_base: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub volume_24h_quote: Decimal,
    /// Percent, `1.25` is 1.25%.
    #[serde(default, deserialize_with = "de::decimal")]
    pub change_percentage: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub index_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct Candle {
    /// Open time, seconds.
    #[serde(deserialize_with = "de::int")]
    pub t: i64,
    #[serde(default, deserialize_with = "de::decimal")]
    pub o: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub l: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub c: Decimal,
    /// Volume in contracts.
    #[serde(default, deserialize_with = "de::decimal")]
    pub v: Decimal,
    /// Base-asset volume; only socket pushes carry it.
    #[serde(default, deserialize_with = "de::decimal")]
    pub a: Decimal,
    /// Candle pushes name the contract (`1h_BTC_USDT`).
    #[serde(default)]
    pub n: String,
}

#[derive(Debug, Deserialize)]
pub struct ContractEntry {
    pub name: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub quanto_multiplier: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub contract_size: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub order_size_min: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub order_size_round: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub order_price_round: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub leverage_max: u32,
}

#[derive(Debug, Deserialize)]
pub struct PositionEntry {
    pub contract: String,
    /// Signed contracts.
    #[serde(default, deserialize_with = "de::decimal")]
    pub size: Decimal,
    /// `single`, `dual_long` or `dual_short`.
    #[serde(default)]
    pub mode: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub unrealised_pnl: Decimal,
    /// `0` means cross margin.
    #[serde(default, deserialize_with = "de::uint")]
    pub leverage: u32,
    #[serde(default, deserialize_with = "de::uint")]
    pub cross_leverage_limit: u32,
    #[serde(default, deserialize_with = "de::decimal")]
    pub margin: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub liq_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct OrderEntry {
    #[serde(deserialize_with = "de::string")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub contract: String,
    /// Signed contracts; negative sells.
    #[serde(default, deserialize_with = "de::decimal")]
    pub size: Decimal,
    /// Unfilled contracts.
    #[serde(default, deserialize_with = "de::decimal")]
    pub left: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fill_price: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub finish_as: String,
    #[serde(default)]
    pub is_reduce_only: bool,
    #[serde(default)]
    pub tif: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub tkfr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub create_time: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub finish_time: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TradeEntry {
    #[serde(deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub order_id: String,
    pub contract: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub size: Decimal,
    /// Contracts closed by this fill; negative closes a long.
    #[serde(default, deserialize_with = "de::decimal")]
    pub close_size: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fee: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub pnl: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub create_time: Decimal,
}
