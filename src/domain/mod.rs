//! Exchange-agnostic trading types.
//!
//! Every adapter converts venue payloads into these types at its boundary:
//! quantities are always base-asset units, statuses are always [`OrderStatus`]
//! values and symbols are always canonical (`BTCUSDT`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod account;
pub mod event;
pub mod market;
pub mod order;
pub mod symbol;
pub mod trade;

pub use account::{Balance, MarginMode, Position, PositionSide};
pub use event::{PrivateEvent, PrivateEventKind};
pub use market::{Kline, Ticker};
pub use order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType};
pub use symbol::{SymbolFormat, SymbolInfo};
pub use trade::{fill_realized_pnl_by_avg_cost, Trade};

/// Supported derivatives venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Binance,
    Bitget,
    Okx,
    Gate,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Binance,
        Platform::Bitget,
        Platform::Okx,
        Platform::Gate,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bitget => "bitget",
            Self::Okx => "okx",
            Self::Gate => "gate",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "bitget" => Ok(Self::Bitget),
            "okx" => Ok(Self::Okx),
            "gate" | "gateio" => Ok(Self::Gate),
            other => Err(format!("unsupported platform: {other}")),
        }
    }
}

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
