//! Unified REST trading interface.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{
    Balance, Kline, MarginMode, Order, OrderRequest, Platform, Position, PositionSide, SymbolInfo,
    Ticker, Trade,
};
use crate::error::Result;

/// One authenticated account on one derivatives venue.
///
/// Symbols are canonical (`BTCUSDT`) on input and output, quantities are
/// base-asset units and every account is operated in hedge mode with
/// isolated margin.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue name for logs (`"binance"`, `"okx"`, ...).
    fn name(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Settlement-currency (USDT) futures balance.
    async fn get_balance(&self) -> Result<Balance>;

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker>;

    /// Most recent `limit` candles, oldest first.
    ///
    /// `interval` uses canonical notation (`1m`, `15m`, `1h`, `4h`, `1d`).
    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>>;

    /// Non-empty positions, optionally restricted to one symbol.
    async fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>>;

    /// Validate locally, convert to venue units and submit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::error::Error::Validation) without
    /// touching the network when the request is malformed.
    async fn create_order(&self, request: &OrderRequest) -> Result<Order>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Order>;

    /// Close the `side` position.
    ///
    /// A zero `quantity` closes the whole position, through the venue's
    /// native close endpoint where one exists. A positive `quantity` is closed
    /// with a reduce-only market order.
    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Order>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    async fn set_margin_type(&self, symbol: &str, mode: MarginMode) -> Result<()>;

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    async fn get_order_history(&self, symbol: &str, limit: u32) -> Result<Vec<Order>>;

    /// Fills with realized PnL, backfilled when the venue omits it.
    async fn get_trade_history(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>>;

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;
}
