//! OKX v5 REST payloads.
//!
//! Every response is `{"code": "0", "msg": "", "data": [...]}`; `data` is an
//! array even for single results.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::adapter::de;

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "de::string")]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ServerTime {
    #[serde(deserialize_with = "de::int")]
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(default, deserialize_with = "de::decimal")]
    pub total_eq: Decimal,
    #[serde(default)]
    pub details: Vec<CurrencyDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyDetail {
    pub ccy: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub eq: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub avail_eq: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub avail_bal: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub frozen_bal: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub upl: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub inst_id: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub last: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub bid_px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub ask_px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub open_24h: Decimal,
    #[serde(default, rename = "high24h", deserialize_with = "de::decimal")]
    pub high_24h: Decimal,
    #[serde(default, rename = "low24h", deserialize_with = "de::decimal")]
    pub low_24h: Decimal,
    /// Volume in base currency.
    #[serde(default, rename = "volCcy24h", deserialize_with = "de::decimal")]
    pub vol_ccy_24h: Decimal,
    /// Volume in contracts.
    #[serde(default, rename = "vol24h", deserialize_with = "de::decimal")]
    pub vol_24h: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPriceEntry {
    pub inst_id: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_px: Decimal,
    #[serde(default, deserialize_with = "de::int")]
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentEntry {
    pub inst_id: String,
    #[serde(default)]
    pub ct_val_ccy: String,
    #[serde(default)]
    pub settle_ccy: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub ct_val: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub lot_sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub min_sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub tick_sz: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub lever: u32,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    pub inst_id: String,
    /// `long`, `short` or `net`.
    #[serde(default)]
    pub pos_side: String,
    /// Contracts; signed in net mode.
    #[serde(default, deserialize_with = "de::decimal")]
    pub pos: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub avg_px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub mark_px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub upl: Decimal,
    #[serde(default, deserialize_with = "de::uint")]
    pub lever: u32,
    #[serde(default)]
    pub mgn_mode: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub margin: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub imr: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub liq_px: Decimal,
}

/// Per-item result of trade endpoints; `sCode` other than `"0"` is a failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    #[serde(default)]
    pub inst_id: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub cl_ord_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    pub inst_id: String,
    pub side: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub ord_type: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub acc_fill_sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub avg_px: Decimal,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fee: Decimal,
    #[serde(default)]
    pub fee_ccy: String,
    #[serde(default, deserialize_with = "de::int")]
    pub c_time: i64,
    #[serde(default, deserialize_with = "de::int")]
    pub u_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillEntry {
    #[serde(default)]
    pub trade_id: String,
    #[serde(default)]
    pub bill_id: String,
    pub ord_id: String,
    pub inst_id: String,
    pub side: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fill_px: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fill_sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fill_pnl: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    pub fee: Decimal,
    #[serde(default)]
    pub fee_ccy: String,
    #[serde(default, deserialize_with = "de::int")]
    pub ts: i64,
}

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, newest first.
pub type CandleRow = Vec<Value>;
