//! Bitget v2 mix REST payloads.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::adapter::de;

/// `{"code": "00000", "msg": "success", "data": ...}`
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "de::string")]
    pub code: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    #[serde(deserialize_with = "de::int")]
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub margin_coin: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub account_equity: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub available: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub locked: Decimal,
    #[serde(default, rename = "unrealizedPL", deserialize_with = "de::decimal")]
    pub unrealized_pl: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub symbol: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub last_pr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub bid_pr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub ask_pr: Decimal,
    #[serde(default, rename = "high24h", deserialize_with = "de::decimal")]
    pub high_24h: Decimal,
    #[serde(default, rename = "low24h", deserialize_with = "de::decimal")]
    pub low_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub base_volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub quote_volume: Decimal,
    /// Ratio, `0.0123` is 1.23%.
    #[serde(default, rename = "change24h", deserialize_with = "de::decimal")]
    pub change_24h: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub index_price: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    pub symbol: String,
    pub hold_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub total: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub available: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub open_price_avg: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_price: Decimal,
    #[serde(default, rename = "unrealizedPL", deserialize_with = "de::decimal")]
    pub unrealized_pl: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub leverage: u32,
    #[serde(default)]
    pub margin_mode: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub margin_size: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub margin: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub liquidation_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    #[serde(default, deserialize_with = "de::string")]
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionsResult {
    #[serde(default)]
    pub success_list: Vec<PlacedOrder>,
    #[serde(default)]
    pub failure_list: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderList {
    #[serde(default)]
    pub entrusted_list: Option<Vec<OrderEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    #[serde(deserialize_with = "de::string")]
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price_avg: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub size: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub base_volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub filled_qty: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fee: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    pub c_time: i64,
    #[serde(default, deserialize_with = "de::int")]
    pub u_time: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillList {
    #[serde(default)]
    pub fill_list: Option<Vec<FillEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillEntry {
    #[serde(deserialize_with = "de::string")]
    pub trade_id: String,
    #[serde(deserialize_with = "de::string")]
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub hold_side: String,
    #[serde(default)]
    pub trade_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub base_volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub profit: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub realized_pnl: Decimal,
    #[serde(default)]
    pub fee_detail: Vec<FeeDetail>,
    #[serde(default, deserialize_with = "de::int")]
    pub c_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDetail {
    #[serde(default, deserialize_with = "de::decimal")]
    pub total_fee: Decimal,
    #[serde(default)]
    pub fee_coin: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEntry {
    pub symbol: String,
    #[serde(default)]
    pub base_coin: String,
    #[serde(default)]
    pub quote_coin: String,
    #[serde(default, deserialize_with = "de::uint")]
    pub price_place: u32,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price_end_step: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub volume_place: u32,
    #[serde(default, deserialize_with = "de::decimal")]
    pub min_trade_num: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub max_lever: u32,
    #[serde(default, deserialize_with = "de::decimal")]
    pub size_multiplier: Decimal,
    #[serde(default, rename = "minTradeUSDT", deserialize_with = "de::decimal")]
    pub min_trade_usdt: Decimal,
}

/// `[ts, open, high, low, close, baseVolume, quoteVolume]`
pub type CandleRow = Vec<Value>;
