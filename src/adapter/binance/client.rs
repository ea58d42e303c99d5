//! Binance USDⓈ-M futures REST client.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::dto::{
    AssetBalance, ExchangeInfo, KlineRow, ListenKey, OrderResponse, PositionRisk, ServerTime,
    SymbolEntry, SymbolFilter, Ticker24h, UserTrade,
};
use super::signer::BinanceSigner;
use crate::adapter::de::{parse_decimal, parse_int};
use crate::adapter::{format_decimal, parse_side, position_not_found};
use crate::config::ExchangeConfig;
use crate::domain::{
    fill_realized_pnl_by_avg_cost, Balance, Kline, MarginMode, Order, OrderRequest, OrderStatus,
    OrderType, Platform, Position, PositionSide, SymbolFormat, SymbolInfo, Ticker, Trade,
};
use crate::error::{Error, Result};
use crate::infrastructure::sign::{params, Params};
use crate::infrastructure::{HttpRequest, RestClient, Services, Session};
use crate::port::ExchangeClient;

pub const MAINNET_URL: &str = "https://fapi.binance.com";
pub const TESTNET_URL: &str = "https://testnet.binancefuture.com";

const SETTLEMENT_ASSET: &str = "USDT";
const HEDGE_MODE_STEP: &str = "hedge_mode";

// -4046 "No need to change margin type", -4059 "No need to change position side"
const ALREADY_SET_CODES: &[i64] = &[-4046, -4059];
const REDUCE_ONLY_REJECTED: i64 = -1106;

pub struct BinanceClient {
    signer: BinanceSigner,
    rest: RestClient,
    services: Arc<Services>,
    session: Session,
    symbols: DashMap<String, SymbolInfo>,
}

impl BinanceClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Result<Self> {
        let default_url = if account.testnet {
            TESTNET_URL
        } else {
            MAINNET_URL
        };
        let rest = RestClient::for_account(account, default_url, &services)?;
        Ok(Self {
            signer: BinanceSigner::new(&account.api_key, &account.secret_key),
            rest,
            services,
            session: Session::new(),
            symbols: DashMap::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    /// Server time in unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns the transport or decode error.
    pub async fn server_time(&self) -> Result<i64> {
        let body = self
            .rest
            .send(&HttpRequest::new(Method::GET, "/fapi/v1/time"))
            .await?;
        Ok(serde_json::from_str::<ServerTime>(&body)?.server_time)
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, query: &Params) -> Result<T> {
        let request = HttpRequest::new(Method::GET, path)
            .query(crate::infrastructure::sign::encode_query(query));
        let body = self.rest.send(&request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &Params,
    ) -> Result<T> {
        let platform = Platform::Binance;
        let clock = &self.services.clock;
        let credential = self.signer.api_key();

        clock
            .ensure_synced(platform, credential, || self.server_time())
            .await;

        let body = clock
            .retry_on_expired(
                platform,
                credential,
                || self.server_time(),
                || {
                    let timestamp = clock.timestamp_ms(platform, credential);
                    let request = self.signer.sign(method.clone(), path, query, timestamp);
                    async move { self.rest.send(&request).await }
                },
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    // ------------------------------------------------------------------
    // Account setup
    // ------------------------------------------------------------------

    async fn ensure_hedge_mode(&self) -> Result<()> {
        self.session
            .ensure(HEDGE_MODE_STEP, || async {
                let query = params(&[("dualSidePosition", "true")]);
                tolerate_already_set(
                    self.signed::<Value>(Method::POST, "/fapi/v1/positionSide/dual", &query)
                        .await,
                )
            })
            .await
    }

    async fn ensure_isolated(&self, symbol: &str) -> Result<()> {
        let key = format!("isolated:{symbol}");
        self.session
            .ensure(&key, || async {
                tolerate_already_set(self.post_margin_type(symbol, "ISOLATED").await)
            })
            .await
    }

    async fn post_margin_type(&self, symbol: &str, margin_type: &str) -> Result<Value> {
        let query = params(&[("symbol", symbol), ("marginType", margin_type)]);
        self.signed(Method::POST, "/fapi/v1/marginType", &query)
            .await
    }

    // ------------------------------------------------------------------
    // Symbol rules
    // ------------------------------------------------------------------

    async fn load_symbols(&self) -> Result<()> {
        let info: ExchangeInfo = self.public("/fapi/v1/exchangeInfo", &Params::new()).await?;
        for entry in info.symbols {
            let symbol_info = symbol_info_from(entry);
            self.symbols.insert(symbol_info.symbol.clone(), symbol_info);
        }
        debug!(count = self.symbols.len(), "Loaded Binance exchange info");
        Ok(())
    }

    async fn cached_symbol(&self, symbol: &str) -> Option<SymbolInfo> {
        if let Some(info) = self.symbols.get(symbol) {
            return Some(info.clone());
        }
        if let Err(e) = self.load_symbols().await {
            warn!(symbol, error = %e, "Failed to load Binance symbol rules");
            return None;
        }
        self.symbols.get(symbol).map(|info| info.clone())
    }

    // ------------------------------------------------------------------
    // listenKey
    // ------------------------------------------------------------------

    /// Open a user-data stream session.
    ///
    /// # Errors
    ///
    /// Returns the venue error.
    pub async fn create_listen_key(&self) -> Result<String> {
        let request = self
            .signer
            .keyed(Method::POST, "/fapi/v1/listenKey", &Params::new());
        let body = self.rest.send(&request).await?;
        Ok(serde_json::from_str::<ListenKey>(&body)?.listen_key)
    }

    /// Extend the current listenKey by 60 minutes.
    ///
    /// # Errors
    ///
    /// Returns the venue error; the key may have expired.
    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<()> {
        let request = self.signer.keyed(
            Method::PUT,
            "/fapi/v1/listenKey",
            &params(&[("listenKey", listen_key)]),
        );
        self.rest.send(&request).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the venue error.
    pub async fn close_listen_key(&self, listen_key: &str) -> Result<()> {
        let request = self.signer.keyed(
            Method::DELETE,
            "/fapi/v1/listenKey",
            &params(&[("listenKey", listen_key)]),
        );
        self.rest.send(&request).await?;
        Ok(())
    }

    async fn submit_order(&self, query: &mut Params, reduce_only: bool) -> Result<OrderResponse> {
        let result = self.signed(Method::POST, "/fapi/v1/order", query).await;
        match result {
            Err(e) if reduce_only && is_reduce_only_rejected(&e) => {
                warn!(error = %e, "reduceOnly rejected, resubmitting without it");
                query.retain(|(key, _)| key != "reduceOnly");
                self.signed(Method::POST, "/fapi/v1/order", query).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn platform(&self) -> Platform {
        Platform::Binance
    }

    async fn get_balance(&self) -> Result<Balance> {
        let assets: Vec<AssetBalance> = self
            .signed(Method::GET, "/fapi/v2/balance", &Params::new())
            .await?;

        let Some(usdt) = assets.into_iter().find(|a| a.asset == SETTLEMENT_ASSET) else {
            return Ok(Balance {
                currency: SETTLEMENT_ASSET.into(),
                ..Balance::default()
            });
        };
        Ok(Balance {
            total_balance: usdt.balance,
            available_balance: usdt.available_balance,
            frozen_balance: (usdt.balance - usdt.available_balance).max(Decimal::ZERO),
            unrealized_pnl: usdt.cross_un_pnl,
            currency: usdt.asset,
        })
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let raw: Ticker24h = self
            .public("/fapi/v1/ticker/24hr", &params(&[("symbol", &native)]))
            .await?;

        Ok(Ticker {
            symbol: SymbolFormat::from_venue(&raw.symbol),
            last_price: raw.last_price,
            bid_price: raw.bid_price,
            ask_price: raw.ask_price,
            high_24h: raw.high_price,
            low_24h: raw.low_price,
            volume_24h: raw.volume,
            quote_volume_24h: raw.quote_volume,
            change_24h: raw.price_change_percent,
            timestamp: raw.close_time,
            ..Ticker::default()
        })
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let limit = limit.to_string();
        let rows: Vec<KlineRow> = self
            .public(
                "/fapi/v1/klines",
                &params(&[("symbol", native.as_str()), ("interval", interval), ("limit", limit.as_str())]),
            )
            .await?;

        Ok(rows
            .iter()
            .filter(|row| row.len() >= 7)
            .map(|row| Kline {
                open_time: parse_int(&row[0]),
                open: parse_decimal(&row[1]),
                high: parse_decimal(&row[2]),
                low: parse_decimal(&row[3]),
                close: parse_decimal(&row[4]),
                volume: parse_decimal(&row[5]),
                close_time: parse_int(&row[6]),
            })
            .collect())
    }

    async fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let query = match symbol {
            Some(s) => params(&[("symbol", SymbolFormat::to_venue(Platform::Binance, s))]),
            None => Params::new(),
        };
        let risks: Vec<PositionRisk> = self
            .signed(Method::GET, "/fapi/v2/positionRisk", &query)
            .await?;

        let wanted = symbol.map(SymbolFormat::normalize);
        Ok(risks
            .into_iter()
            .filter(|r| !r.position_amt.is_zero())
            .filter(|r| wanted.as_deref().map_or(true, |w| w == r.symbol))
            .map(position_from)
            .collect())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        let native = SymbolFormat::to_venue(Platform::Binance, &request.symbol);

        if let Err(e) = self.ensure_hedge_mode().await {
            warn!(error = %e, "Could not enable hedge mode");
        }
        if let Err(e) = self.ensure_isolated(&native).await {
            warn!(symbol = %native, error = %e, "Could not set isolated margin");
        }

        let mut quantity = request.quantity;
        let mut price = request.price;
        if let Some(rules) = self.cached_symbol(&native).await {
            quantity = rules.round_quantity(quantity, request.reduce_only);
            price = price.map(|p| rules.round_price(p, request.side));
        }
        if quantity <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "quantity {} rounds to zero for {native}",
                request.quantity
            )));
        }

        let position_side = request.effective_position_side();
        let mut query = params(&[
            ("symbol", native.as_str()),
            ("side", request.side.as_str()),
            ("positionSide", position_side.as_str()),
            ("type", request.order_type.as_str()),
        ]);
        query.push(("quantity".into(), format_decimal(quantity)));
        if request.order_type == OrderType::Limit {
            if let Some(price) = price {
                query.push(("price".into(), format_decimal(price)));
                query.push(("timeInForce".into(), "GTC".into()));
            }
        }
        if request.reduce_only {
            query.push(("reduceOnly".into(), "true".into()));
        }
        if let Some(client_id) = &request.client_order_id {
            query.push(("newClientOrderId".into(), client_id.clone()));
        }

        let response = self.submit_order(&mut query, request.reduce_only).await?;
        info!(
            symbol = %native,
            side = %request.side,
            position_side = %position_side,
            quantity = %quantity,
            order_id = %response.order_id,
            "Binance order placed"
        );
        order_from(response)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Order> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let query = params(&[("symbol", native.as_str()), ("orderId", order_id)]);
        let response: OrderResponse = self
            .signed(Method::DELETE, "/fapi/v1/order", &query)
            .await?;
        order_from(response)
    }

    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Order> {
        let quantity = if quantity > Decimal::ZERO {
            quantity
        } else {
            self.get_positions(Some(symbol))
                .await?
                .into_iter()
                .find(|p| p.position_side == side)
                .map(|p| p.size())
                .ok_or_else(|| position_not_found(symbol, side))?
        };
        self.create_order(&OrderRequest::close(symbol, side, quantity))
            .await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let query = params(&[("symbol", native), ("leverage", leverage.to_string())]);
        let _: Value = self
            .signed(Method::POST, "/fapi/v1/leverage", &query)
            .await?;
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, mode: MarginMode) -> Result<()> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        tolerate_already_set(self.post_margin_type(&native, mode.as_str()).await)
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let query = match symbol {
            Some(s) => params(&[("symbol", SymbolFormat::to_venue(Platform::Binance, s))]),
            None => Params::new(),
        };
        let orders: Vec<OrderResponse> = self
            .signed(Method::GET, "/fapi/v1/openOrders", &query)
            .await?;
        orders.into_iter().map(order_from).collect()
    }

    async fn get_order_history(&self, symbol: &str, limit: u32) -> Result<Vec<Order>> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let query = params(&[("symbol", native), ("limit", limit.to_string())]);
        let orders: Vec<OrderResponse> = self
            .signed(Method::GET, "/fapi/v1/allOrders", &query)
            .await?;
        orders.into_iter().map(order_from).collect()
    }

    async fn get_trade_history(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        let query = params(&[("symbol", native), ("limit", limit.to_string())]);
        let fills: Vec<UserTrade> = self
            .signed(Method::GET, "/fapi/v1/userTrades", &query)
            .await?;

        let mut trades = fills
            .into_iter()
            .map(|fill| -> Result<Trade> {
                Ok(Trade {
                    trade_id: fill.id,
                    order_id: fill.order_id,
                    symbol: SymbolFormat::from_venue(&fill.symbol),
                    side: parse_side(&fill.side)?,
                    position_side: fill.position_side.parse().ok(),
                    price: fill.price,
                    quantity: fill.qty,
                    realized_pnl: fill.realized_pnl,
                    commission: fill.commission,
                    commission_asset: fill.commission_asset,
                    time: fill.time,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        fill_realized_pnl_by_avg_cost(&mut trades);
        Ok(trades)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let native = SymbolFormat::to_venue(Platform::Binance, symbol);
        if let Some(info) = self.symbols.get(&native) {
            return Ok(info.clone());
        }
        self.load_symbols().await?;
        self.symbols
            .get(&native)
            .map(|info| info.clone())
            .ok_or_else(|| Error::Validation(format!("unknown symbol {native}")))
    }
}

// ----------------------------------------------------------------------
// Mapping
// ----------------------------------------------------------------------

fn tolerate_already_set<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_already_set(&e) => {
            debug!(error = %e, "Setting already applied");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_already_set(err: &Error) -> bool {
    err.api().is_some_and(|api| {
        api.numeric_code()
            .is_some_and(|code| ALREADY_SET_CODES.contains(&code))
            || api.message.to_lowercase().contains("no need to change")
    })
}

fn is_reduce_only_rejected(err: &Error) -> bool {
    err.api().is_some_and(|api| {
        let message = api.message.to_lowercase();
        api.numeric_code() == Some(REDUCE_ONLY_REJECTED)
            && message.contains("reduceonly")
            && message.contains("not required")
    })
}

fn symbol_info_from(entry: SymbolEntry) -> SymbolInfo {
    let mut info = SymbolInfo::new(&entry.symbol);
    if !entry.base_asset.is_empty() {
        info.base_coin = entry.base_asset;
    }
    if !entry.quote_asset.is_empty() {
        info.quote_coin = entry.quote_asset;
    }
    info.price_precision = entry.price_precision;
    info.qty_precision = entry.quantity_precision;
    for filter in entry.filters {
        match filter {
            SymbolFilter::Price { tick_size } => info.tick_size = tick_size,
            SymbolFilter::LotSize { step_size, min_qty } => {
                info.step_size = step_size;
                info.min_qty = min_qty;
            }
            SymbolFilter::MinNotional { notional } => info.min_notional = notional,
            SymbolFilter::Other => {}
        }
    }
    info
}

fn position_from(risk: PositionRisk) -> Position {
    // One-way accounts report BOTH; the sign of the amount decides.
    let side = risk.position_side.parse().unwrap_or(if risk.position_amt < Decimal::ZERO {
        PositionSide::Short
    } else {
        PositionSide::Long
    });
    let mut position = Position::new(SymbolFormat::from_venue(&risk.symbol), side, risk.position_amt);
    position.entry_price = risk.entry_price;
    position.mark_price = risk.mark_price;
    position.unrealized_pnl = risk.un_realized_profit;
    position.leverage = risk.leverage;
    position.margin_type = risk.margin_type.parse().unwrap_or(MarginMode::Crossed);
    position.isolated_margin = risk.isolated_margin;
    position.margin = risk.isolated_margin;
    position.liquidation_price = risk.liquidation_price;
    position
}

fn order_from(raw: OrderResponse) -> Result<Order> {
    Ok(Order {
        order_id: raw.order_id,
        client_id: raw.client_order_id,
        symbol: SymbolFormat::from_venue(&raw.symbol),
        side: parse_side(&raw.side)?,
        position_side: raw.position_side.parse().ok(),
        order_type: raw.order_type.parse().unwrap_or(OrderType::Market),
        price: raw.price,
        quantity: raw.orig_qty,
        filled_qty: raw.executed_qty,
        avg_price: raw.avg_price,
        status: OrderStatus::from_venue(&raw.status),
        fee: Decimal::ZERO,
        fee_coin: String::new(),
        create_time: if raw.time > 0 { raw.time } else { raw.update_time },
        update_time: raw.update_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_already_set_detection() {
        let by_code = Error::Api(ApiError::new(Platform::Binance, 400, "-4046", "x"));
        assert!(is_already_set(&by_code));
        let by_text = Error::Api(ApiError::new(
            Platform::Binance,
            400,
            "-9999",
            "No need to change position side.",
        ));
        assert!(is_already_set(&by_text));
        let other = Error::Api(ApiError::new(Platform::Binance, 400, "-2019", "Margin is insufficient."));
        assert!(!is_already_set(&other));
    }

    #[test]
    fn test_reduce_only_rejection() {
        let err = Error::Api(ApiError::new(
            Platform::Binance,
            400,
            "-1106",
            "Parameter 'reduceonly' sent when not required.",
        ));
        assert!(is_reduce_only_rejected(&err));
        let unrelated = Error::Api(ApiError::new(Platform::Binance, 400, "-1106", "Parameter 'price' sent when not required."));
        assert!(!is_reduce_only_rejected(&unrelated));
    }

    #[test]
    fn test_symbol_info_from_filters() {
        let entry: SymbolEntry = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","baseAsset":"BTC","quoteAsset":"USDT","pricePrecision":2,
                "quantityPrecision":3,"filters":[
                {"filterType":"PRICE_FILTER","tickSize":"0.10","minPrice":"556.80"},
                {"filterType":"LOT_SIZE","stepSize":"0.001","minQty":"0.001","maxQty":"1000"},
                {"filterType":"MIN_NOTIONAL","notional":"100"},
                {"filterType":"PERCENT_PRICE","multiplierUp":"1.05"}]}"#,
        )
        .unwrap();
        let info = symbol_info_from(entry);
        assert_eq!(info.tick_size, dec!(0.1));
        assert_eq!(info.step_size, dec!(0.001));
        assert_eq!(info.min_qty, dec!(0.001));
        assert_eq!(info.min_notional, dec!(100));
        assert_eq!(info.base_coin, "BTC");
    }

    #[test]
    fn test_position_from_one_way_short() {
        let risk: PositionRisk = serde_json::from_str(
            r#"{"symbol":"ETHUSDT","positionSide":"BOTH","positionAmt":"-2.5","entryPrice":"3000",
                "markPrice":"2990","unRealizedProfit":"25","leverage":"10","marginType":"isolated",
                "isolatedMargin":"750","liquidationPrice":"3500"}"#,
        )
        .unwrap();
        let position = position_from(risk);
        assert_eq!(position.position_side, PositionSide::Short);
        assert_eq!(position.position_amt, dec!(-2.5));
        assert_eq!(position.leverage, 10);
        assert_eq!(position.margin_type, MarginMode::Isolated);
    }

    #[test]
    fn test_order_from_response() {
        let raw: OrderResponse = serde_json::from_str(
            r#"{"orderId":283194212,"clientOrderId":"abc","symbol":"BTCUSDT","side":"SELL",
                "positionSide":"LONG","type":"MARKET","price":"0","origQty":"0.010",
                "executedQty":"0.010","avgPrice":"50000.0","status":"FILLED","updateTime":1700000000000}"#,
        )
        .unwrap();
        let order = order_from(raw).unwrap();
        assert_eq!(order.order_id, "283194212");
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.position_side, Some(PositionSide::Long));
        assert_eq!(order.create_time, 1_700_000_000_000);
    }
}
