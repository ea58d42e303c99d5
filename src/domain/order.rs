//! Orders: requests, normalized responses and status mapping.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PositionSide;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    #[must_use]
    pub const fn as_lower(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Side of the order that reduces a position held on `side`.
    #[must_use]
    pub const fn closing(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => Self::Sell,
            PositionSide::Short => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("invalid order side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
        }
    }

    #[must_use]
    pub const fn as_lower(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            other => Err(format!("invalid order type: {other}")),
        }
    }
}

/// Normalized order status.
///
/// Venue strings that have no clear counterpart map to [`OrderStatus::Unknown`]
/// instead of being guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Unknown,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Map a venue status string.
    ///
    /// Covers Binance (`NEW`, `PARTIALLY_FILLED`, ...), Bitget (`live`,
    /// `partially_filled`, `full-fill`, ...), OKX (`live`, `partially_filled`,
    /// `filled`, `canceled`, `mmp_canceled`) and Gate (`open`, `finished`).
    #[must_use]
    pub fn from_venue(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" | "live" | "init" | "open" | "pending" | "not_trigger" => Self::New,
            "partially_filled" | "partial-fill" | "partial_fill" => Self::PartiallyFilled,
            "filled" | "full-fill" | "full_fill" => Self::Filled,
            "canceled" | "cancelled" | "cancel" | "mmp_canceled" => Self::Canceled,
            "rejected" | "reject" => Self::Rejected,
            "expired" | "expire" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLIENT_ID_LEN: usize = 24;

/// Order submission request. `quantity` is always in base-asset units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    /// Position being opened or reduced. Derived from `side` when absent.
    #[serde(default)]
    pub position_side: Option<PositionSide>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Required for limit orders.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            position_side: None,
            order_type: OrderType::Market,
            quantity,
            price: None,
            reduce_only: false,
            client_order_id: None,
        }
    }

    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    #[must_use]
    pub fn with_position_side(mut self, side: PositionSide) -> Self {
        self.position_side = Some(side);
        self
    }

    #[must_use]
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    #[must_use]
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Random alphanumeric client id, short enough for every venue's limit.
    #[must_use]
    pub fn new_client_order_id() -> String {
        uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(CLIENT_ID_LEN)
            .collect()
    }

    /// Reduce-only market order that closes `quantity` of the `side` position.
    #[must_use]
    pub fn close(symbol: impl Into<String>, side: PositionSide, quantity: Decimal) -> Self {
        Self::market(symbol, OrderSide::closing(side), quantity)
            .with_position_side(side)
            .reduce_only()
    }

    /// Position side this order acts on.
    ///
    /// Opening orders: BUY opens LONG, SELL opens SHORT. Reduce-only orders act
    /// on the opposite side of their direction.
    #[must_use]
    pub fn effective_position_side(&self) -> PositionSide {
        if let Some(side) = self.position_side {
            return side;
        }
        match (self.side, self.reduce_only) {
            (OrderSide::Buy, false) | (OrderSide::Sell, true) => PositionSide::Long,
            (OrderSide::Sell, false) | (OrderSide::Buy, true) => PositionSide::Short,
        }
    }

    /// Limit price, or zero for market orders.
    #[must_use]
    pub fn price_or_zero(&self) -> Decimal {
        self.price.unwrap_or(Decimal::ZERO)
    }

    /// Check the request locally before any network call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty symbol, a non-positive
    /// quantity, or a limit order without a positive price.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::Validation("symbol must not be empty".into()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.order_type == OrderType::Limit && self.price_or_zero() <= Decimal::ZERO {
            return Err(Error::Validation(
                "limit order requires a positive price".into(),
            ));
        }
        Ok(())
    }
}

/// Normalized order state as reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub client_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Decimal,
    /// Base-asset quantity.
    pub quantity: Decimal,
    pub filled_qty: Decimal,
    pub avg_price: Decimal,
    pub status: OrderStatus,
    pub fee: Decimal,
    pub fee_coin: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl Order {
    /// Order echoing a request, before venue fields are filled in.
    #[must_use]
    pub fn from_request(req: &OrderRequest, order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            client_id: req.client_order_id.clone().unwrap_or_default(),
            symbol: req.symbol.clone(),
            side: req.side,
            position_side: Some(req.effective_position_side()),
            order_type: req.order_type,
            price: req.price_or_zero(),
            quantity: req.quantity,
            filled_qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            status: OrderStatus::New,
            fee: Decimal::ZERO,
            fee_coin: String::new(),
            create_time: super::now_ms(),
            update_time: 0,
        }
    }
}
