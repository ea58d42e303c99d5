//! Bitget v2 USDT-margined futures REST client.
//!
//! Accounts run in hedge mode, so every order names its `holdSide`. Order
//! submissions from one client are spaced at least 100ms apart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::dto::{
    Account, CandleRow, ClosePositionsResult, ContractEntry, Envelope, FillEntry, FillList,
    OrderEntry, OrderList, PlacedOrder, PositionEntry, ServerTime, TickerEntry,
};
use super::signer::BitgetSigner;
use crate::adapter::de::{parse_decimal, parse_int};
use crate::adapter::{
    format_decimal, kline_close_time, parse_side, position_not_found, upper_interval,
};
use crate::config::ExchangeConfig;
use crate::domain::{
    fill_realized_pnl_by_avg_cost, Balance, Kline, MarginMode, Order, OrderRequest, OrderSide,
    OrderStatus, OrderType, Platform, Position, PositionSide, SymbolFormat, SymbolInfo, Ticker,
    Trade,
};
use crate::error::{ApiError, Error, Result};
use crate::infrastructure::sign::{encode_query, params, Params};
use crate::infrastructure::{HttpRequest, RestClient, Services};
use crate::port::ExchangeClient;

pub const MAINNET_URL: &str = "https://api.bitget.com";

pub(crate) const PRODUCT_TYPE: &str = "USDT-FUTURES";
const MARGIN_COIN: &str = "USDT";
const SUCCESS_CODE: &str = "00000";
const REQUEST_SPACING: Duration = Duration::from_millis(100);

pub struct BitgetClient {
    signer: BitgetSigner,
    rest: RestClient,
    services: Arc<Services>,
    symbols: DashMap<String, SymbolInfo>,
    /// Earliest instant the next order may be submitted.
    next_request_at: Mutex<Option<Instant>>,
}

impl BitgetClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Result<Self> {
        let rest = RestClient::for_account(account, MAINNET_URL, &services)?;
        Ok(Self {
            signer: BitgetSigner::new(
                &account.api_key,
                &account.secret_key,
                &account.passphrase,
            ),
            rest,
            services,
            symbols: DashMap::new(),
            next_request_at: Mutex::new(None),
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
        let time: ServerTime = self.public("/api/v2/public/time", &Params::new()).await?;
        Ok(time.server_time)
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, query: &Params) -> Result<T> {
        let request = HttpRequest::new(Method::GET, path).query(encode_query(query));
        self.space_requests().await;
        let body = self.rest.send(&request).await?;
        Ok(serde_json::from_value(unwrap_data(&body)?)?)
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &Params,
        body: Option<Value>,
    ) -> Result<T> {
        let platform = Platform::Bitget;
        let clock = &self.services.clock;
        let credential = self.signer.api_key();
        let query = encode_query(query);
        let body = body.map(|b| b.to_string());

        clock
            .ensure_synced(platform, credential, || self.server_time())
            .await;

        let data = clock
            .retry_on_expired(
                platform,
                credential,
                || self.server_time(),
                || {
                    let mut request = HttpRequest::new(method.clone(), path).query(query.clone());
                    if let Some(body) = &body {
                        request = request.body(body.clone());
                    }
                    async move {
                        self.space_requests().await;
                        let request = self
                            .signer
                            .sign(request, clock.timestamp_ms(platform, credential));
                        unwrap_data(&self.rest.send(&request).await?)
                    }
                },
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Wait for this client's next request slot.
    ///
    /// The slot is reserved under the lock and the sleep happens after it is
    /// released.
    async fn space_requests(&self) {
        let wait = {
            let mut next = self.next_request_at.lock();
            let now = Instant::now();
            let slot = next.map_or(now, |at| at.max(now));
            *next = Some(slot + REQUEST_SPACING);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Spacing Bitget request");
            tokio::time::sleep(wait).await;
        }
    }

    async fn load_symbols(&self) -> Result<()> {
        let contracts: Vec<ContractEntry> = self
            .public("/api/v2/mix/market/contracts", &params(&[("productType", PRODUCT_TYPE)]))
            .await?;
        for contract in contracts {
            let info = symbol_info_from(contract);
            self.symbols.insert(info.symbol.clone(), info);
        }
        debug!(count = self.symbols.len(), "Loaded Bitget contracts");
        Ok(())
    }

    async fn cached_symbol(&self, symbol: &str) -> Option<SymbolInfo> {
        if let Some(info) = self.symbols.get(symbol) {
            return Some(info.clone());
        }
        if let Err(e) = self.load_symbols().await {
            warn!(symbol, error = %e, "Failed to load Bitget contract rules");
            return None;
        }
        self.symbols.get(symbol).map(|info| info.clone())
    }

    async fn position_size(&self, symbol: &str, side: PositionSide) -> Result<Decimal> {
        self.get_positions(Some(symbol))
            .await?
            .into_iter()
            .find(|p| p.position_side == side)
            .map(|p| p.size())
            .ok_or_else(|| position_not_found(symbol, side))
    }

    /// Flash close through `close-positions`.
    async fn close_all(&self, native: &str, side: PositionSide) -> Result<String> {
        let body = json!({
            "symbol": native,
            "productType": PRODUCT_TYPE,
            "holdSide": side.as_lower(),
        });
        let result: ClosePositionsResult = self
            .signed(Method::POST, "/api/v2/mix/order/close-positions", &Params::new(), Some(body))
            .await?;
        match result.success_list.into_iter().next() {
            Some(placed) => Ok(placed.order_id),
            None => Err(Error::Validation(format!(
                "close-positions closed nothing for {native} {side}: {:?}",
                result.failure_list
            ))),
        }
    }

    fn orders_query(symbol: Option<&str>) -> Params {
        let mut query = params(&[("productType", PRODUCT_TYPE)]);
        if let Some(symbol) = symbol {
            query.push(("symbol".into(), SymbolFormat::to_venue(Platform::Bitget, symbol)));
        }
        query
    }
}

#[async_trait]
impl ExchangeClient for BitgetClient {
    fn name(&self) -> &str {
        "bitget"
    }

    fn platform(&self) -> Platform {
        Platform::Bitget
    }

    async fn get_balance(&self) -> Result<Balance> {
        let accounts: Vec<Account> = self
            .signed(
                Method::GET,
                "/api/v2/mix/account/accounts",
                &params(&[("productType", PRODUCT_TYPE)]),
                None,
            )
            .await?;

        let Some(usdt) = accounts.into_iter().find(|a| a.margin_coin == MARGIN_COIN) else {
            return Ok(Balance {
                currency: MARGIN_COIN.into(),
                ..Balance::default()
            });
        };
        Ok(Balance {
            total_balance: usdt.account_equity,
            available_balance: usdt.available,
            frozen_balance: usdt.locked,
            unrealized_pnl: usdt.unrealized_pl,
            currency: usdt.margin_coin,
        })
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let entries: Vec<TickerEntry> = self
            .public(
                "/api/v2/mix/market/ticker",
                &params(&[("symbol", native.as_str()), ("productType", PRODUCT_TYPE)]),
            )
            .await?;
        let raw = entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::Validation(format!("no ticker for {native}")))?;
        Ok(ticker_from(raw))
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let granularity = upper_interval(interval);
        let limit = limit.to_string();
        let rows: Vec<CandleRow> = self
            .public(
                "/api/v2/mix/market/candles",
                &params(&[
                    ("symbol", native.as_str()),
                    ("productType", PRODUCT_TYPE),
                    ("granularity", granularity.as_str()),
                    ("limit", limit.as_str()),
                ]),
            )
            .await?;
        Ok(klines_from(&rows, interval))
    }

    async fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let (path, query) = match symbol {
            Some(s) => (
                "/api/v2/mix/position/single-position",
                params(&[
                    ("symbol", SymbolFormat::to_venue(Platform::Bitget, s).as_str()),
                    ("productType", PRODUCT_TYPE),
                    ("marginCoin", MARGIN_COIN),
                ]),
            ),
            None => (
                "/api/v2/mix/position/all-position",
                params(&[("productType", PRODUCT_TYPE), ("marginCoin", MARGIN_COIN)]),
            ),
        };
        let entries: Vec<PositionEntry> = self.signed(Method::GET, path, &query, None).await?;

        let wanted = symbol.map(SymbolFormat::normalize);
        Ok(entries
            .into_iter()
            .filter_map(position_from)
            .filter(|p| !p.is_empty())
            .filter(|p| wanted.as_deref().map_or(true, |w| w == p.symbol))
            .collect())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        let native = SymbolFormat::to_venue(Platform::Bitget, &request.symbol);

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
        let (side, trade_side) = order_direction(request.side, position_side, request.reduce_only);

        let mut body = Map::new();
        body.insert("symbol".into(), json!(native));
        body.insert("productType".into(), json!(PRODUCT_TYPE));
        body.insert("marginMode".into(), json!("isolated"));
        body.insert("marginCoin".into(), json!(MARGIN_COIN));
        body.insert("side".into(), json!(side));
        body.insert("tradeSide".into(), json!(trade_side));
        body.insert("holdSide".into(), json!(position_side.as_lower()));
        body.insert("orderType".into(), json!(request.order_type.as_lower()));
        body.insert("size".into(), json!(format_decimal(quantity)));
        if request.order_type == OrderType::Limit {
            if let Some(price) = price {
                body.insert("price".into(), json!(format_decimal(price)));
                body.insert("force".into(), json!("gtc"));
            }
        }
        if let Some(client_id) = &request.client_order_id {
            body.insert("clientOid".into(), json!(client_id));
        }

        let placed: PlacedOrder = self
            .signed(
                Method::POST,
                "/api/v2/mix/order/place-order",
                &Params::new(),
                Some(Value::Object(body)),
            )
            .await?;
        info!(
            symbol = %native,
            side,
            trade_side,
            hold_side = position_side.as_lower(),
            quantity = %quantity,
            order_id = %placed.order_id,
            "Bitget order placed"
        );

        let mut order = Order::from_request(request, placed.order_id);
        order.symbol = SymbolFormat::from_venue(&native);
        order.quantity = quantity;
        order.price = price.unwrap_or(Decimal::ZERO);
        if !placed.client_oid.is_empty() {
            order.client_id = placed.client_oid;
        }
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Order> {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let body = json!({
            "symbol": native,
            "productType": PRODUCT_TYPE,
            "orderId": order_id,
        });
        let placed: PlacedOrder = self
            .signed(Method::POST, "/api/v2/mix/order/cancel-order", &Params::new(), Some(body))
            .await?;

        let mut order = Order::from_request(
            &OrderRequest::market(SymbolFormat::from_venue(&native), OrderSide::Buy, Decimal::ZERO),
            placed.order_id,
        );
        order.position_side = None;
        order.client_id = placed.client_oid;
        order.status = OrderStatus::Canceled;
        Ok(order)
    }

    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Order> {
        if quantity > Decimal::ZERO {
            return self
                .create_order(&OrderRequest::close(symbol, side, quantity))
                .await;
        }

        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let size = self.position_size(symbol, side).await?;
        match self.close_all(&native, side).await {
            Ok(order_id) => {
                info!(symbol = %native, side = %side, order_id = %order_id, "Bitget position flash-closed");
                Ok(Order::from_request(&OrderRequest::close(symbol, side, size), order_id))
            }
            Err(e) => {
                warn!(symbol = %native, side = %side, error = %e, "Flash close failed, using reduce-only order");
                self.create_order(&OrderRequest::close(symbol, side, size))
                    .await
            }
        }
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let body = json!({
            "symbol": SymbolFormat::to_venue(Platform::Bitget, symbol),
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "leverage": leverage.to_string(),
        });
        let _: Value = self
            .signed(Method::POST, "/api/v2/mix/account/set-leverage", &Params::new(), Some(body))
            .await?;
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, mode: MarginMode) -> Result<()> {
        let body = json!({
            "symbol": SymbolFormat::to_venue(Platform::Bitget, symbol),
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "marginMode": mode.as_str().to_lowercase(),
        });
        let _: Value = self
            .signed(Method::POST, "/api/v2/mix/account/set-margin-mode", &Params::new(), Some(body))
            .await?;
        Ok(())
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let list: OrderList = self
            .signed(
                Method::GET,
                "/api/v2/mix/order/orders-pending",
                &Self::orders_query(symbol),
                None,
            )
            .await?;
        list.entrusted_list
            .unwrap_or_default()
            .into_iter()
            .map(order_from)
            .collect()
    }

    async fn get_order_history(&self, symbol: &str, limit: u32) -> Result<Vec<Order>> {
        let mut query = Self::orders_query(Some(symbol));
        query.push(("limit".into(), limit.to_string()));
        let list: OrderList = self
            .signed(Method::GET, "/api/v2/mix/order/orders-history", &query, None)
            .await?;
        list.entrusted_list
            .unwrap_or_default()
            .into_iter()
            .map(order_from)
            .collect()
    }

    async fn get_trade_history(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>> {
        let mut query = Self::orders_query(Some(symbol));
        query.push(("limit".into(), limit.to_string()));
        let list: FillList = self
            .signed(Method::GET, "/api/v2/mix/order/fills", &query, None)
            .await?;

        let mut trades = list
            .fill_list
            .unwrap_or_default()
            .into_iter()
            .map(trade_from)
            .collect::<Result<Vec<_>>>()?;
        fill_realized_pnl_by_avg_cost(&mut trades);
        Ok(trades)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
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

/// `data` of a successful envelope; any other `code` is an API error even
/// on HTTP 200.
fn unwrap_data(body: &str) -> Result<Value> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.code != SUCCESS_CODE {
        return Err(Error::Api(ApiError::from_response(Platform::Bitget, 200, body)));
    }
    Ok(envelope.data)
}

/// `(side, tradeSide)` in hedge mode. Closing orders name the direction of
/// the position being closed, not of the trade.
fn order_direction(
    side: OrderSide,
    position_side: PositionSide,
    reduce_only: bool,
) -> (&'static str, &'static str) {
    if reduce_only {
        let side = match position_side {
            PositionSide::Long => "buy",
            PositionSide::Short => "sell",
        };
        (side, "close")
    } else {
        (side.as_lower(), "open")
    }
}

fn ticker_from(raw: TickerEntry) -> Ticker {
    Ticker {
        symbol: SymbolFormat::from_venue(&raw.symbol),
        last_price: raw.last_pr,
        mark_price: raw.mark_price,
        index_price: raw.index_price,
        bid_price: raw.bid_pr,
        ask_price: raw.ask_pr,
        high_24h: raw.high_24h,
        low_24h: raw.low_24h,
        volume_24h: raw.base_volume,
        quote_volume_24h: raw.quote_volume,
        change_24h: raw.change_24h * Decimal::ONE_HUNDRED,
        timestamp: raw.ts,
    }
}

fn klines_from(rows: &[CandleRow], interval: &str) -> Vec<Kline> {
    let mut klines: Vec<Kline> = rows
        .iter()
        .filter(|row| row.len() >= 6)
        .map(|row| {
            let open_time = parse_int(&row[0]);
            Kline {
                open_time,
                open: parse_decimal(&row[1]),
                high: parse_decimal(&row[2]),
                low: parse_decimal(&row[3]),
                close: parse_decimal(&row[4]),
                volume: parse_decimal(&row[5]),
                close_time: kline_close_time(open_time, interval),
            }
        })
        .collect();
    klines.sort_by_key(|k| k.open_time);
    klines
}

fn position_from(raw: PositionEntry) -> Option<Position> {
    let side: PositionSide = raw.hold_side.parse().ok()?;
    let amount = if raw.total.is_zero() {
        raw.available
    } else {
        raw.total
    };
    let margin = if raw.margin_size.is_zero() {
        raw.margin
    } else {
        raw.margin_size
    };
    let mut position = Position::new(SymbolFormat::from_venue(&raw.symbol), side, amount);
    position.entry_price = raw.open_price_avg;
    position.mark_price = raw.mark_price;
    position.unrealized_pnl = raw.unrealized_pl;
    position.leverage = raw.leverage;
    position.margin_type = raw.margin_mode.parse().unwrap_or(MarginMode::Isolated);
    position.margin = margin;
    position.isolated_margin = margin;
    position.liquidation_price = raw.liquidation_price;
    Some(position)
}

fn order_from(raw: OrderEntry) -> Result<Order> {
    let status = if raw.status.is_empty() {
        &raw.state
    } else {
        &raw.status
    };
    let filled = if raw.base_volume.is_zero() {
        raw.filled_qty
    } else {
        raw.base_volume
    };
    Ok(Order {
        order_id: raw.order_id,
        client_id: raw.client_oid,
        symbol: SymbolFormat::from_venue(&raw.symbol),
        side: parse_side(&raw.side)?,
        position_side: raw.pos_side.parse().ok(),
        order_type: raw.order_type.parse().unwrap_or(OrderType::Market),
        price: raw.price,
        quantity: raw.size,
        filled_qty: filled,
        avg_price: raw.price_avg,
        status: OrderStatus::from_venue(status),
        fee: raw.fee.abs(),
        fee_coin: MARGIN_COIN.into(),
        create_time: raw.c_time,
        update_time: raw.u_time,
    })
}

fn trade_from(raw: FillEntry) -> Result<Trade> {
    let position_side = raw
        .pos_side
        .parse::<PositionSide>()
        .or_else(|_| raw.hold_side.parse())
        .ok();
    let realized_pnl = if raw.profit.is_zero() {
        raw.realized_pnl
    } else {
        raw.profit
    };
    let (commission, commission_asset) = raw
        .fee_detail
        .first()
        .map(|fee| (fee.total_fee.abs(), fee.fee_coin.clone()))
        .unwrap_or((Decimal::ZERO, MARGIN_COIN.to_string()));
    Ok(Trade {
        trade_id: raw.trade_id,
        order_id: raw.order_id,
        symbol: SymbolFormat::from_venue(&raw.symbol),
        side: parse_side(&raw.side)?,
        position_side,
        price: raw.price,
        quantity: raw.base_volume,
        realized_pnl,
        commission,
        commission_asset,
        time: raw.c_time,
    })
}

fn symbol_info_from(raw: ContractEntry) -> SymbolInfo {
    let mut info = SymbolInfo::new(&raw.symbol);
    if !raw.base_coin.is_empty() {
        info.base_coin = raw.base_coin;
    }
    if !raw.quote_coin.is_empty() {
        info.quote_coin = raw.quote_coin;
    }
    let unit = Decimal::new(1, raw.price_place);
    info.price_precision = raw.price_place;
    info.tick_size = if raw.price_end_step > Decimal::ZERO {
        (raw.price_end_step * unit).normalize()
    } else {
        unit
    };
    info.qty_precision = raw.volume_place;
    info.step_size = if raw.size_multiplier > Decimal::ZERO {
        raw.size_multiplier
    } else {
        Decimal::new(1, raw.volume_place)
    };
    info.min_qty = raw.min_trade_num;
    info.max_leverage = raw.max_lever;
    info.min_notional = raw.min_trade_usdt;
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_envelope_code_checked_on_success_status() {
        let ok = unwrap_data(r#"{"code":"00000","msg":"success","data":{"orderId":"1"}}"#).unwrap();
        assert_eq!(ok["orderId"], "1");

        let err = unwrap_data(r#"{"code":"40008","msg":"Request timestamp expired","data":null}"#)
            .unwrap_err();
        assert!(err.is_timestamp_expired());
        let api = err.api().unwrap();
        assert_eq!(api.code, "40008");
        assert_eq!(api.status, 200);
    }

    #[test]
    fn test_hedge_mode_direction() {
        assert_eq!(order_direction(OrderSide::Buy, PositionSide::Long, false), ("buy", "open"));
        assert_eq!(order_direction(OrderSide::Sell, PositionSide::Short, false), ("sell", "open"));
        assert_eq!(order_direction(OrderSide::Sell, PositionSide::Long, true), ("buy", "close"));
        assert_eq!(order_direction(OrderSide::Buy, PositionSide::Short, true), ("sell", "close"));
    }

    #[test]
    fn test_ticker_change_is_percent() {
        let raw: TickerEntry = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","lastPr":"50000","bidPr":"49999.9","askPr":"50000.1",
                "high24h":"51000","low24h":"49000","baseVolume":"1200","quoteVolume":"6e7",
                "change24h":"0.0125","markPrice":"50001","indexPrice":"50002","ts":"1700000000000"}"#,
        )
        .unwrap();
        let ticker = ticker_from(raw);
        assert_eq!(ticker.change_24h, dec!(1.25));
        assert_eq!(ticker.mark_price, dec!(50001));
        assert_eq!(ticker.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_klines_sorted_with_close_time() {
        let rows: Vec<CandleRow> = serde_json::from_str(
            r#"[["120000","2","3","1","2.5","10","25"],["60000","1","2","0.5","2","5","10"]]"#,
        )
        .unwrap();
        let klines = klines_from(&rows, "1m");
        assert_eq!(klines[0].open_time, 60_000);
        assert_eq!(klines[0].close_time, 119_999);
        assert_eq!(klines[1].close, dec!(2.5));
    }

    #[test]
    fn test_position_from_short() {
        let raw: PositionEntry = serde_json::from_str(
            r#"{"symbol":"ETHUSDT","holdSide":"short","total":"1.5","available":"1.5",
                "openPriceAvg":"3000","markPrice":"2950","unrealizedPL":"75","leverage":"20",
                "marginMode":"isolated","marginSize":"225","liquidationPrice":"3100"}"#,
        )
        .unwrap();
        let position = position_from(raw).unwrap();
        assert_eq!(position.position_side, PositionSide::Short);
        assert_eq!(position.position_amt, dec!(-1.5));
        assert_eq!(position.leverage, 20);
        assert_eq!(position.margin, dec!(225));
    }

    #[test]
    fn test_symbol_info_from_contract() {
        let raw: ContractEntry = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","baseCoin":"BTC","quoteCoin":"USDT","pricePlace":"1",
                "priceEndStep":"1","volumePlace":"3","minTradeNum":"0.001","maxLever":"125",
                "sizeMultiplier":"0.001","minTradeUSDT":"5"}"#,
        )
        .unwrap();
        let info = symbol_info_from(raw);
        assert_eq!(info.tick_size, dec!(0.1));
        assert_eq!(info.step_size, dec!(0.001));
        assert_eq!(info.min_qty, dec!(0.001));
        assert_eq!(info.max_leverage, 125);
        assert_eq!(info.contract_size, Decimal::ONE);
    }

    #[test]
    fn test_order_and_trade_mapping() {
        let raw: OrderEntry = serde_json::from_str(
            r#"{"orderId":"1001","clientOid":"c1","symbol":"BTCUSDT","side":"buy","posSide":"long",
                "orderType":"limit","price":"50000","priceAvg":"0","size":"0.01","baseVolume":"0",
                "status":"live","cTime":"1700000000000","uTime":"1700000000001"}"#,
        )
        .unwrap();
        let order = order_from(raw).unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.position_side, Some(PositionSide::Long));

        let fill: FillEntry = serde_json::from_str(
            r#"{"tradeId":"t1","orderId":"1001","symbol":"BTCUSDT","side":"sell","posSide":"long",
                "price":"51000","baseVolume":"0.01","profit":"10",
                "feeDetail":[{"totalFee":"-0.3","feeCoin":"USDT"}],"cTime":"1700000000000"}"#,
        )
        .unwrap();
        let trade = trade_from(fill).unwrap();
        assert_eq!(trade.realized_pnl, dec!(10));
        assert_eq!(trade.commission, dec!(0.3));
        assert_eq!(trade.side, OrderSide::Sell);
    }
}
