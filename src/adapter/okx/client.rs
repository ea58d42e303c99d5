//! OKX v5 USDT perpetual swap REST client.
//!
//! OKX sizes orders in contracts. Base quantities are converted through the
//! instrument's `ctVal` and rounded to `lotSz`; positions and fills are
//! converted back so callers only ever see base-asset units.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::dto::{
    AccountBalance, CandleRow, ClosedPosition, Envelope, FillEntry, InstrumentEntry, OrderAck,
    OrderEntry, PositionEntry, ServerTime, TickerEntry,
};
use super::signer::OkxSigner;
use crate::adapter::de::{parse_decimal, parse_int};
use crate::adapter::{
    format_decimal, kline_close_time, parse_side, position_not_found, upper_interval,
};
use crate::config::ExchangeConfig;
use crate::domain::symbol::decimals_of;
use crate::domain::{
    fill_realized_pnl_by_avg_cost, Balance, Kline, MarginMode, Order, OrderRequest, OrderSide,
    OrderStatus, OrderType, Platform, Position, PositionSide, SymbolFormat, SymbolInfo, Ticker,
    Trade,
};
use crate::error::{ApiError, Error, Result};
use crate::infrastructure::sign::{encode_query, params, Params};
use crate::infrastructure::{HttpRequest, RestClient, Services};
use crate::port::ExchangeClient;

pub const MAINNET_URL: &str = "https://www.okx.com";

pub(crate) const INST_TYPE: &str = "SWAP";
const MARGIN_CCY: &str = "USDT";
const TD_MODE: &str = "isolated";
const SUCCESS_CODE: &str = "0";

pub struct OkxClient {
    signer: OkxSigner,
    rest: RestClient,
    services: Arc<Services>,
    /// Instrument rules keyed by canonical symbol.
    symbols: DashMap<String, SymbolInfo>,
}

impl OkxClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Result<Self> {
        let rest = RestClient::for_account(account, MAINNET_URL, &services)?;
        Ok(Self {
            signer: OkxSigner::new(
                &account.api_key,
                &account.secret_key,
                &account.passphrase,
                account.testnet,
            ),
            rest,
            services,
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
        let times: Vec<ServerTime> = self.public("/api/v5/public/time", &Params::new()).await?;
        times
            .first()
            .map(|t| t.ts)
            .ok_or_else(|| Error::Validation("empty OKX server time".into()))
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, query: &Params) -> Result<T> {
        let request = HttpRequest::new(Method::GET, path).query(encode_query(query));
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
        let platform = Platform::Okx;
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
                    let request = self
                        .signer
                        .sign(request, clock.timestamp_ms(platform, credential));
                    async move { unwrap_data(&self.rest.send(&request).await?) }
                },
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn load_symbols(&self) -> Result<()> {
        let instruments: Vec<InstrumentEntry> = self
            .public("/api/v5/public/instruments", &params(&[("instType", INST_TYPE)]))
            .await?;
        for instrument in instruments {
            let info = symbol_info_from(instrument);
            self.symbols.insert(info.symbol.clone(), info);
        }
        debug!(count = self.symbols.len(), "Loaded OKX instruments");
        Ok(())
    }

    /// Contract value for `symbol`, 1 when the instrument cannot be loaded.
    async fn contract_value(&self, symbol: &str) -> Decimal {
        match self.get_symbol_info(symbol).await {
            Ok(info) => info.contract_size,
            Err(e) => {
                warn!(symbol, error = %e, "Missing OKX ctVal, assuming 1");
                Decimal::ONE
            }
        }
    }

    async fn position_size(&self, symbol: &str, side: PositionSide) -> Result<Decimal> {
        self.get_positions(Some(symbol))
            .await?
            .into_iter()
            .find(|p| p.position_side == side)
            .map(|p| p.size())
            .ok_or_else(|| position_not_found(symbol, side))
    }

    /// Market-close the whole `side` position with `close-position`.
    async fn close_all(&self, inst_id: &str, side: PositionSide) -> Result<String> {
        let body = json!({
            "instId": inst_id,
            "mgnMode": TD_MODE,
            "posSide": side.as_lower(),
            "autoCxl": true,
        });
        let closed: Vec<ClosedPosition> = self
            .signed(Method::POST, "/api/v5/trade/close-position", &Params::new(), Some(body))
            .await?;
        Ok(closed
            .into_iter()
            .next()
            .map(|c| c.cl_ord_id)
            .unwrap_or_default())
    }

    fn orders_query(symbol: Option<&str>) -> Params {
        let mut query = params(&[("instType", INST_TYPE)]);
        if let Some(symbol) = symbol {
            query.push(("instId".into(), SymbolFormat::to_venue(Platform::Okx, symbol)));
        }
        query
    }

    async fn orders_from(&self, entries: Vec<OrderEntry>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            let ct_val = self.contract_value(&entry.inst_id).await;
            orders.push(order_from(entry, ct_val)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl ExchangeClient for OkxClient {
    fn name(&self) -> &str {
        "okx"
    }

    fn platform(&self) -> Platform {
        Platform::Okx
    }

    async fn get_balance(&self) -> Result<Balance> {
        let accounts: Vec<AccountBalance> = self
            .signed(
                Method::GET,
                "/api/v5/account/balance",
                &params(&[("ccy", MARGIN_CCY)]),
                None,
            )
            .await?;
        Ok(accounts
            .into_iter()
            .next()
            .map(balance_from)
            .unwrap_or_else(|| Balance {
                currency: MARGIN_CCY.into(),
                ..Balance::default()
            }))
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        let entries: Vec<TickerEntry> = self
            .public("/api/v5/market/ticker", &params(&[("instId", inst_id.as_str())]))
            .await?;
        let raw = entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::Validation(format!("no ticker for {inst_id}")))?;
        Ok(ticker_from(raw))
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        let bar = upper_interval(interval);
        let limit = limit.to_string();
        let rows: Vec<CandleRow> = self
            .public(
                "/api/v5/market/candles",
                &params(&[
                    ("instId", inst_id.as_str()),
                    ("bar", bar.as_str()),
                    ("limit", limit.as_str()),
                ]),
            )
            .await?;
        Ok(klines_from(&rows, interval))
    }

    async fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let mut query = params(&[("instType", INST_TYPE)]);
        if let Some(symbol) = symbol {
            query.push(("instId".into(), SymbolFormat::to_venue(Platform::Okx, symbol)));
        }
        let entries: Vec<PositionEntry> = self
            .signed(Method::GET, "/api/v5/account/positions", &query, None)
            .await?;

        let mut positions = Vec::new();
        for entry in entries.into_iter().filter(|e| !e.pos.is_zero()) {
            let ct_val = self.contract_value(&entry.inst_id).await;
            if let Some(position) = position_from(entry, ct_val) {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        let inst_id = SymbolFormat::to_venue(Platform::Okx, &request.symbol);
        let rules = self.get_symbol_info(&request.symbol).await?;

        let contracts = contracts_for(&rules, request.quantity, request.reduce_only);
        if contracts <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "quantity {} is below one contract of {inst_id} (ctVal {})",
                request.quantity, rules.contract_size
            )));
        }
        let price = request.price.map(|p| rules.round_price(p, request.side));
        let position_side = request.effective_position_side();

        let mut body = Map::new();
        body.insert("instId".into(), json!(inst_id));
        body.insert("tdMode".into(), json!(TD_MODE));
        body.insert("side".into(), json!(request.side.as_lower()));
        body.insert("posSide".into(), json!(position_side.as_lower()));
        body.insert("ordType".into(), json!(request.order_type.as_lower()));
        body.insert("sz".into(), json!(format_decimal(contracts)));
        if request.reduce_only {
            body.insert("reduceOnly".into(), json!(true));
        }
        if request.order_type == OrderType::Limit {
            if let Some(price) = price {
                body.insert("px".into(), json!(format_decimal(price)));
            }
        }
        if let Some(client_id) = &request.client_order_id {
            body.insert("clOrdId".into(), json!(client_id));
        }

        let acks: Vec<OrderAck> = self
            .signed(
                Method::POST,
                "/api/v5/trade/order",
                &Params::new(),
                Some(Value::Object(body)),
            )
            .await?;
        let ack = acks
            .into_iter()
            .next()
            .ok_or_else(|| Error::Validation("empty OKX order response".into()))?;
        info!(
            symbol = %inst_id,
            side = request.side.as_lower(),
            pos_side = position_side.as_lower(),
            contracts = %contracts,
            order_id = %ack.ord_id,
            "OKX order placed"
        );

        let mut order = Order::from_request(request, ack.ord_id);
        order.symbol = SymbolFormat::from_venue(&inst_id);
        order.quantity = contracts * rules.contract_size;
        order.price = price.unwrap_or(Decimal::ZERO);
        if !ack.cl_ord_id.is_empty() {
            order.client_id = ack.cl_ord_id;
        }
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Order> {
        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        let body = json!({"instId": inst_id, "ordId": order_id});
        let acks: Vec<OrderAck> = self
            .signed(Method::POST, "/api/v5/trade/cancel-order", &Params::new(), Some(body))
            .await?;

        let ack = acks.into_iter().next();
        let mut order = Order::from_request(
            &OrderRequest::market(SymbolFormat::from_venue(&inst_id), OrderSide::Buy, Decimal::ZERO),
            ack.as_ref().map_or(order_id, |a| a.ord_id.as_str()),
        );
        order.position_side = None;
        order.client_id = ack.map(|a| a.cl_ord_id).unwrap_or_default();
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

        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        let size = self.position_size(symbol, side).await?;
        match self.close_all(&inst_id, side).await {
            Ok(client_id) => {
                info!(symbol = %inst_id, side = %side, "OKX position closed");
                let mut order = Order::from_request(&OrderRequest::close(symbol, side, size), "");
                order.client_id = client_id;
                Ok(order)
            }
            Err(e) => {
                warn!(symbol = %inst_id, side = %side, error = %e, "close-position failed, using reduce-only order");
                self.create_order(&OrderRequest::close(symbol, side, size))
                    .await
            }
        }
    }

    /// Applied to both position sides; hedge mode keeps a leverage per side.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let inst_id = SymbolFormat::to_venue(Platform::Okx, symbol);
        for side in [PositionSide::Long, PositionSide::Short] {
            let body = json!({
                "instId": inst_id,
                "mgnMode": TD_MODE,
                "lever": leverage.to_string(),
                "posSide": side.as_lower(),
            });
            let _: Value = self
                .signed(Method::POST, "/api/v5/account/set-leverage", &Params::new(), Some(body))
                .await?;
        }
        Ok(())
    }

    /// Margin mode is chosen per order through `tdMode`, which is always
    /// isolated.
    async fn set_margin_type(&self, symbol: &str, mode: MarginMode) -> Result<()> {
        match mode {
            MarginMode::Isolated => Ok(()),
            MarginMode::Crossed => Err(Error::Validation(format!(
                "OKX orders for {symbol} use isolated margin only"
            ))),
        }
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let entries: Vec<OrderEntry> = self
            .signed(
                Method::GET,
                "/api/v5/trade/orders-pending",
                &Self::orders_query(symbol),
                None,
            )
            .await?;
        self.orders_from(entries).await
    }

    async fn get_order_history(&self, symbol: &str, limit: u32) -> Result<Vec<Order>> {
        let mut query = Self::orders_query(Some(symbol));
        query.push(("limit".into(), limit.to_string()));
        let entries: Vec<OrderEntry> = self
            .signed(Method::GET, "/api/v5/trade/orders-history", &query, None)
            .await?;
        self.orders_from(entries).await
    }

    async fn get_trade_history(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>> {
        let mut query = Self::orders_query(Some(symbol));
        query.push(("limit".into(), limit.to_string()));
        let fills: Vec<FillEntry> = self
            .signed(Method::GET, "/api/v5/trade/fills", &query, None)
            .await?;

        let ct_val = self.contract_value(symbol).await;
        let mut trades = fills
            .into_iter()
            .map(|fill| trade_from(fill, ct_val))
            .collect::<Result<Vec<_>>>()?;
        fill_realized_pnl_by_avg_cost(&mut trades);
        Ok(trades)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let canonical = SymbolFormat::normalize(symbol);
        if let Some(info) = self.symbols.get(&canonical) {
            return Ok(info.clone());
        }
        self.load_symbols().await?;
        self.symbols
            .get(&canonical)
            .map(|info| info.clone())
            .ok_or_else(|| Error::Validation(format!("unknown OKX instrument {canonical}")))
    }
}

// ----------------------------------------------------------------------
// Mapping
// ----------------------------------------------------------------------

/// `data` of a successful envelope.
///
/// A non-zero top-level `code`, or a per-item `sCode` other than `"0"`, is an
/// API error even on HTTP 200. The item code is more specific and wins.
fn unwrap_data(body: &str) -> Result<Value> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let item = envelope.data.get(0);
    let item_code = item
        .and_then(|d| d.get("sCode"))
        .map(|c| parse_int(c).to_string())
        .filter(|c| c != "0");
    if let Some(code) = item_code {
        let message = item
            .and_then(|d| d.get("sMsg"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut err = ApiError::new(Platform::Okx, 200, code, message);
        err.raw_body = body.to_string();
        return Err(Error::Api(err));
    }
    if envelope.code != SUCCESS_CODE {
        return Err(Error::Api(ApiError::from_response(Platform::Okx, 200, body)));
    }
    Ok(envelope.data)
}

/// Contracts for a base quantity, on the instrument's lot grid.
///
/// Opening orders round up to `lotSz` and to at least `minSz`; reduce-only
/// orders round down.
fn contracts_for(rules: &SymbolInfo, quantity: Decimal, reduce_only: bool) -> Decimal {
    if rules.contract_size <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (rules.round_quantity(quantity, reduce_only) / rules.contract_size).normalize()
}

pub(crate) fn balance_from(raw: AccountBalance) -> Balance {
    let detail = raw
        .details
        .into_iter()
        .find(|d| d.ccy.eq_ignore_ascii_case(MARGIN_CCY));
    let Some(detail) = detail else {
        return Balance {
            total_balance: raw.total_eq,
            currency: MARGIN_CCY.into(),
            ..Balance::default()
        };
    };
    let available = if detail.avail_eq.is_zero() {
        detail.avail_bal
    } else {
        detail.avail_eq
    };
    let total = if raw.total_eq.is_zero() {
        detail.eq
    } else {
        raw.total_eq
    };
    Balance {
        total_balance: total,
        available_balance: available,
        frozen_balance: detail.frozen_bal,
        unrealized_pnl: detail.upl,
        currency: detail.ccy,
    }
}

pub(crate) fn ticker_from(raw: TickerEntry) -> Ticker {
    let change = if raw.open_24h.is_zero() {
        Decimal::ZERO
    } else {
        ((raw.last - raw.open_24h) / raw.open_24h * Decimal::ONE_HUNDRED).round_dp(4)
    };
    Ticker {
        symbol: SymbolFormat::from_venue(&raw.inst_id),
        last_price: raw.last,
        mark_price: Decimal::ZERO,
        index_price: Decimal::ZERO,
        bid_price: raw.bid_px,
        ask_price: raw.ask_px,
        high_24h: raw.high_24h,
        low_24h: raw.low_24h,
        volume_24h: raw.vol_ccy_24h,
        quote_volume_24h: (raw.vol_ccy_24h * raw.last).round_dp(8),
        change_24h: change,
        timestamp: raw.ts,
    }
}

/// Rows arrive newest first; `volCcy` (index 6) is the base-asset volume.
pub(crate) fn klines_from(rows: &[CandleRow], interval: &str) -> Vec<Kline> {
    let mut klines: Vec<Kline> = rows
        .iter()
        .filter(|row| row.len() >= 6)
        .map(|row| {
            let open_time = parse_int(&row[0]);
            let volume = row.get(6).map_or_else(|| parse_decimal(&row[5]), parse_decimal);
            Kline {
                open_time,
                open: parse_decimal(&row[1]),
                high: parse_decimal(&row[2]),
                low: parse_decimal(&row[3]),
                close: parse_decimal(&row[4]),
                volume,
                close_time: kline_close_time(open_time, interval),
            }
        })
        .collect();
    klines.sort_by_key(|k| k.open_time);
    klines
}

fn position_from(raw: PositionEntry, ct_val: Decimal) -> Option<Position> {
    let side = match raw.pos_side.as_str() {
        "net" if raw.pos < Decimal::ZERO => PositionSide::Short,
        "net" => PositionSide::Long,
        other => other.parse().ok()?,
    };
    let margin = if raw.margin.is_zero() { raw.imr } else { raw.margin };
    let mut position = Position::new(
        SymbolFormat::from_venue(&raw.inst_id),
        side,
        raw.pos * ct_val,
    );
    position.entry_price = raw.avg_px;
    position.mark_price = raw.mark_px;
    position.unrealized_pnl = raw.upl;
    position.leverage = raw.lever;
    position.margin_type = raw.mgn_mode.parse().unwrap_or(MarginMode::Isolated);
    position.margin = margin;
    position.isolated_margin = margin;
    position.liquidation_price = raw.liq_px;
    Some(position)
}

fn order_from(raw: OrderEntry, ct_val: Decimal) -> Result<Order> {
    Ok(Order {
        order_id: raw.ord_id,
        client_id: raw.cl_ord_id,
        symbol: SymbolFormat::from_venue(&raw.inst_id),
        side: parse_side(&raw.side)?,
        position_side: raw.pos_side.parse().ok(),
        order_type: raw.ord_type.parse().unwrap_or(OrderType::Market),
        price: raw.px,
        quantity: raw.sz * ct_val,
        filled_qty: raw.acc_fill_sz * ct_val,
        avg_price: raw.avg_px,
        status: OrderStatus::from_venue(&raw.state),
        fee: raw.fee.abs(),
        fee_coin: if raw.fee_ccy.is_empty() {
            MARGIN_CCY.into()
        } else {
            raw.fee_ccy
        },
        create_time: raw.c_time,
        update_time: raw.u_time,
    })
}

fn trade_from(raw: FillEntry, ct_val: Decimal) -> Result<Trade> {
    Ok(Trade {
        trade_id: if raw.trade_id.is_empty() {
            raw.bill_id
        } else {
            raw.trade_id
        },
        order_id: raw.ord_id,
        symbol: SymbolFormat::from_venue(&raw.inst_id),
        side: parse_side(&raw.side)?,
        position_side: raw.pos_side.parse().ok(),
        price: raw.fill_px,
        quantity: raw.fill_sz * ct_val,
        realized_pnl: raw.fill_pnl,
        commission: raw.fee.abs(),
        commission_asset: if raw.fee_ccy.is_empty() {
            MARGIN_CCY.into()
        } else {
            raw.fee_ccy
        },
        time: raw.ts,
    })
}

fn symbol_info_from(raw: InstrumentEntry) -> SymbolInfo {
    let mut info = SymbolInfo::new(&raw.inst_id);
    if !raw.ct_val_ccy.is_empty() {
        info.base_coin = raw.ct_val_ccy;
    }
    if !raw.settle_ccy.is_empty() {
        info.quote_coin = raw.settle_ccy;
    }
    if raw.ct_val > Decimal::ZERO {
        info.contract_size = raw.ct_val;
    }
    info.tick_size = raw.tick_sz;
    info.price_precision = decimals_of(raw.tick_sz);
    info.step_size = (raw.lot_sz * info.contract_size).normalize();
    info.qty_precision = decimals_of(info.step_size);
    info.min_qty = (raw.min_sz * info.contract_size).normalize();
    info.max_leverage = raw.lever;
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_swap() -> SymbolInfo {
        symbol_info_from(
            serde_json::from_str(
                r#"{"instId":"BTC-USDT-SWAP","ctValCcy":"BTC","settleCcy":"USDT","ctVal":"0.01",
                    "lotSz":"1","minSz":"1","tickSz":"0.1","lever":"100","state":"live"}"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_instrument_rules_in_base_units() {
        let info = btc_swap();
        assert_eq!(info.symbol, "BTCUSDT");
        assert_eq!(info.contract_size, dec!(0.01));
        assert_eq!(info.step_size, dec!(0.01));
        assert_eq!(info.min_qty, dec!(0.01));
        assert_eq!(info.tick_size, dec!(0.1));
        assert_eq!(info.price_precision, 1);
        assert_eq!(info.max_leverage, 100);
    }

    #[test]
    fn test_contracts_round_up_to_min_size() {
        let info = btc_swap();
        assert_eq!(contracts_for(&info, dec!(0.0033), false), dec!(1));
        assert_eq!(contracts_for(&info, dec!(0.025), false), dec!(3));
        assert_eq!(contracts_for(&info, dec!(0.025), true), dec!(2));
        assert_eq!(contracts_for(&info, dec!(0.0033), true), dec!(0));
    }

    #[test]
    fn test_item_code_is_an_error() {
        let err = unwrap_data(
            r#"{"code":"1","msg":"","data":[{"ordId":"","sCode":"51008","sMsg":"Insufficient balance"}]}"#,
        )
        .unwrap_err();
        let api = err.api().unwrap();
        assert_eq!(api.code, "51008");
        assert_eq!(api.message, "Insufficient balance");

        let ok = unwrap_data(r#"{"code":"0","msg":"","data":[{"ordId":"9","sCode":"0","sMsg":""}]}"#)
            .unwrap();
        assert_eq!(ok[0]["ordId"], "9");
    }

    #[test]
    fn test_expired_timestamp_code() {
        let err = unwrap_data(r#"{"code":"50102","msg":"Timestamp request expired","data":[]}"#)
            .unwrap_err();
        assert!(err.is_timestamp_expired());
    }

    #[test]
    fn test_balance_prefers_avail_eq() {
        let raw: AccountBalance = serde_json::from_str(
            r#"{"totalEq":"1050.5","details":[{"ccy":"USDT","eq":"1050.5","availEq":"",
                "availBal":"1000","frozenBal":"50.5","upl":"-3"}]}"#,
        )
        .unwrap();
        let balance = balance_from(raw);
        assert_eq!(balance.total_balance, dec!(1050.5));
        assert_eq!(balance.available_balance, dec!(1000));
        assert_eq!(balance.frozen_balance, dec!(50.5));
        assert_eq!(balance.unrealized_pnl, dec!(-3));
    }

    #[test]
    fn test_ticker_change_from_open() {
        let raw: TickerEntry = serde_json::from_str(
            r#"{"instId":"BTC-USDT-SWAP","last":"51000","bidPx":"50999","askPx":"51001",
                "open24h":"50000","high24h":"52000","low24h":"49000","volCcy24h":"10",
                "vol24h":"1000","ts":"1700000000000"}"#,
        )
        .unwrap();
        let ticker = ticker_from(raw);
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.change_24h, dec!(2));
        assert_eq!(ticker.volume_24h, dec!(10));
        assert_eq!(ticker.quote_volume_24h, dec!(510000));
    }

    #[test]
    fn test_position_converted_to_base_units() {
        let raw: PositionEntry = serde_json::from_str(
            r#"{"instId":"BTC-USDT-SWAP","posSide":"short","pos":"3","avgPx":"50000",
                "markPx":"49000","upl":"30","lever":"10","mgnMode":"isolated","margin":"150",
                "imr":"","liqPx":"55000"}"#,
        )
        .unwrap();
        let position = position_from(raw, dec!(0.01)).unwrap();
        assert_eq!(position.position_side, PositionSide::Short);
        assert_eq!(position.position_amt, dec!(-0.03));
        assert_eq!(position.leverage, 10);

        let net: PositionEntry = serde_json::from_str(
            r#"{"instId":"ETH-USDT-SWAP","posSide":"net","pos":"-2"}"#,
        )
        .unwrap();
        let position = position_from(net, dec!(0.1)).unwrap();
        assert_eq!(position.position_side, PositionSide::Short);
        assert_eq!(position.size(), dec!(0.2));
    }

    #[test]
    fn test_order_and_fill_mapping() {
        let raw: OrderEntry = serde_json::from_str(
            r#"{"ordId":"1","clOrdId":"","instId":"BTC-USDT-SWAP","side":"buy","posSide":"long",
                "ordType":"limit","px":"50000","sz":"2","accFillSz":"1","avgPx":"50000",
                "state":"partially_filled","fee":"-0.1","feeCcy":"USDT","cTime":"1","uTime":"2"}"#,
        )
        .unwrap();
        let order = order_from(raw, dec!(0.01)).unwrap();
        assert_eq!(order.quantity, dec!(0.02));
        assert_eq!(order.filled_qty, dec!(0.01));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.fee, dec!(0.1));

        let fill: FillEntry = serde_json::from_str(
            r#"{"tradeId":"","billId":"b1","ordId":"1","instId":"BTC-USDT-SWAP","side":"sell",
                "posSide":"long","fillPx":"51000","fillSz":"1","fillPnl":"10","fee":"-0.2",
                "feeCcy":"USDT","ts":"1700000000000"}"#,
        )
        .unwrap();
        let trade = trade_from(fill, dec!(0.01)).unwrap();
        assert_eq!(trade.trade_id, "b1");
        assert_eq!(trade.quantity, dec!(0.01));
        assert_eq!(trade.realized_pnl, dec!(10));
    }

    #[test]
    fn test_candles_sorted_ascending() {
        let rows: Vec<CandleRow> = serde_json::from_str(
            r#"[["3600000","2","3","1","2.5","500","5","12","1"],
                ["0","1","2","0.5","2","100","1","2","1"]]"#,
        )
        .unwrap();
        let klines = klines_from(&rows, "1h");
        assert_eq!(klines[0].open_time, 0);
        assert_eq!(klines[0].volume, dec!(1));
        assert_eq!(klines[1].close_time, 7_199_999);
    }
}
