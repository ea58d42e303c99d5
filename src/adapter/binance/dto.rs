//! Binance REST payloads.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::adapter::de;

#[derive(Debug, Deserialize)]
pub struct ServerTime {
    #[serde(rename = "serverTime")]
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKey {
    pub listen_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub asset: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub balance: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub available_balance: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub cross_un_pnl: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub last_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub bid_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub ask_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub high_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub low_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub quote_volume: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price_change_percent: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    pub close_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    #[serde(default)]
    pub position_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub position_amt: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub un_realized_profit: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub leverage: u32,
    #[serde(default)]
    pub margin_type: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub isolated_margin: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub liquidation_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(deserialize_with = "de::string")]
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub position_side: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub orig_qty: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub executed_qty: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub avg_price: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "de::int")]
    pub time: i64,
    #[serde(default, deserialize_with = "de::int")]
    pub update_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTrade {
    #[serde(deserialize_with = "de::string")]
    pub id: String,
    #[serde(deserialize_with = "de::string")]
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub position_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub qty: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub realized_pnl: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub commission: Decimal,
    #[serde(default)]
    pub commission_asset: String,
    #[serde(default, deserialize_with = "de::int")]
    pub time: i64,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    pub symbol: String,
    #[serde(default)]
    pub base_asset: String,
    #[serde(default)]
    pub quote_asset: String,
    #[serde(default)]
    pub price_precision: u32,
    #[serde(default)]
    pub quantity_precision: u32,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Exchange-info filters; only the ones used for rounding are decoded.
#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    Price {
        #[serde(rename = "tickSize", deserialize_with = "de::decimal")]
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize", deserialize_with = "de::decimal")]
        step_size: Decimal,
        #[serde(rename = "minQty", deserialize_with = "de::decimal")]
        min_qty: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional {
        #[serde(deserialize_with = "de::decimal")]
        notional: Decimal,
    },
    #[serde(other)]
    Other,
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`
pub type KlineRow = Vec<Value>;
