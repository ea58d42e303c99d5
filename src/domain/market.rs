//! Market data: tickers and candlesticks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest market snapshot for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub last_price: Decimal,
    /// Zero when the venue did not report one.
    pub mark_price: Decimal,
    pub index_price: Decimal,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    /// Base-asset volume.
    pub volume_24h: Decimal,
    pub quote_volume_24h: Decimal,
    /// Percent, e.g. `2.5` for +2.5%.
    pub change_24h: Decimal,
    pub timestamp: i64,
}

impl Ticker {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Price used for risk and PnL: mark price when present, else last price.
    #[must_use]
    pub fn effective_mark_price(&self) -> Decimal {
        if self.mark_price > Decimal::ZERO {
            self.mark_price
        } else {
            self.last_price
        }
    }
}

/// One candlestick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// Length of a canonical interval (`1m`, `4h`, `1d`, ...) in milliseconds.
///
/// Returns `None` for intervals that are not a number followed by `m`, `h`,
/// `d` or `w`.
#[must_use]
pub fn interval_millis(interval: &str) -> Option<i64> {
    let interval = interval.trim();
    let unit = interval.chars().last()?;
    let count: i64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    let unit_ms = match unit.to_ascii_lowercase() {
        'm' if unit == 'M' => 30 * 86_400_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 7 * 86_400_000,
        _ => return None,
    };
    Some(count * unit_ms)
}
