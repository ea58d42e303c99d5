//! Account balances and positions.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Futures wallet balance in the settlement currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_balance: Decimal,
    pub available_balance: Decimal,
    pub frozen_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub currency: String,
}

/// Position direction in hedge mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    /// Lowercase form used by Bitget `holdSide` and OKX `posSide`.
    #[must_use]
    pub const fn as_lower(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            other => Err(format!("invalid position side: {other}")),
        }
    }
}

/// Margin allocation mode. Only isolated margin is traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginMode {
    Isolated,
    Crossed,
}

impl MarginMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Isolated => "ISOLATED",
            Self::Crossed => "CROSSED",
        }
    }
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolated" => Ok(Self::Isolated),
            "crossed" | "cross" => Ok(Self::Crossed),
            other => Err(format!("invalid margin mode: {other}")),
        }
    }
}

/// Open position, always expressed in base-asset units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub position_side: PositionSide,
    /// Signed base quantity: positive for LONG, negative for SHORT.
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub margin_type: MarginMode,
    pub isolated_margin: Decimal,
    pub liquidation_price: Decimal,
}

impl Position {
    /// Create a position, forcing the amount's sign to agree with `side`.
    #[must_use]
    pub fn new(symbol: impl Into<String>, side: PositionSide, amount: Decimal) -> Self {
        let magnitude = amount.abs();
        let position_amt = match side {
            PositionSide::Long => magnitude,
            PositionSide::Short => -magnitude,
        };
        Self {
            symbol: symbol.into(),
            position_side: side,
            position_amt,
            entry_price: Decimal::ZERO,
            mark_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            leverage: 0,
            margin: Decimal::ZERO,
            margin_type: MarginMode::Isolated,
            isolated_margin: Decimal::ZERO,
            liquidation_price: Decimal::ZERO,
        }
    }

    /// Absolute base quantity.
    #[must_use]
    pub fn size(&self) -> Decimal {
        self.position_amt.abs()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position_amt.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_sign_follows_side() {
        let long = Position::new("BTCUSDT", PositionSide::Long, dec!(-0.5));
        assert_eq!(long.position_amt, dec!(0.5));

        let short = Position::new("BTCUSDT", PositionSide::Short, dec!(0.5));
        assert_eq!(short.position_amt, dec!(-0.5));
        assert_eq!(short.size(), dec!(0.5));
    }

    #[test]
    fn test_parse_sides_and_modes() {
        assert_eq!("long".parse::<PositionSide>(), Ok(PositionSide::Long));
        assert_eq!(" SHORT ".parse::<PositionSide>(), Ok(PositionSide::Short));
        assert!("both".parse::<PositionSide>().is_err());
        assert_eq!("ISOLATED".parse::<MarginMode>(), Ok(MarginMode::Isolated));
        assert_eq!("cross".parse::<MarginMode>(), Ok(MarginMode::Crossed));
    }
}
