//! Gate v4 USDT-settled futures REST client.
//!
//! Orders are sized in contracts through the contract's `quanto_multiplier`;
//! the sign of `size` carries the direction. The account is switched to dual
//! (hedge) mode once per client before the first position call.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::dto::{
    Account, Candle, ContractEntry, OrderEntry, PositionEntry, ServerTime, TickerEntry,
    TradeEntry,
};
use super::signer::GateSigner;
use crate::adapter::{format_decimal, kline_close_time, position_not_found};
use crate::config::ExchangeConfig;
use crate::domain::symbol::decimals_of;
use crate::domain::{
    fill_realized_pnl_by_avg_cost, now_ms, Balance, Kline, MarginMode, Order, OrderRequest,
    OrderSide, OrderStatus, OrderType, Platform, Position, PositionSide, SymbolFormat,
    SymbolInfo, Ticker, Trade,
};
use crate::error::{ApiError, Error, Result};
use crate::infrastructure::sign::{encode_sorted_query, params, Params};
use crate::infrastructure::{HttpRequest, RestClient, Services, Session};
use crate::port::ExchangeClient;

pub const MAINNET_URL: &str = "https://api.gateio.ws";

const PREFIX: &str = "/api/v4/futures/usdt";
const SETTLE: &str = "USDT";
const DUAL_MODE_STEP: &str = "dual_mode";
/// Gate rejects client ids without this prefix.
const TEXT_PREFIX: &str = "t-";

pub struct GateClient {
    signer: GateSigner,
    rest: RestClient,
    services: Arc<Services>,
    session: Session,
    /// Contract rules keyed by canonical symbol.
    symbols: DashMap<String, SymbolInfo>,
}

impl GateClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Result<Self> {
        let rest = RestClient::for_account(account, MAINNET_URL, &services)?;
        Ok(Self {
            signer: GateSigner::new(&account.api_key, &account.secret_key),
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
        let request = HttpRequest::new(Method::GET, "/api/v4/spot/time");
        let body = self.rest.send(&request).await?;
        let time: ServerTime = serde_json::from_value(check_label(&body)?)?;
        Ok(time.server_time)
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, query: &Params) -> Result<T> {
        let request =
            HttpRequest::new(Method::GET, format!("{PREFIX}{path}")).query(encode_sorted_query(query));
        let body = self.rest.send(&request).await?;
        Ok(serde_json::from_value(check_label(&body)?)?)
    }

    /// The query is sorted once and the same string is both signed and sent.
    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &Params,
        body: Option<Value>,
    ) -> Result<T> {
        let platform = Platform::Gate;
        let clock = &self.services.clock;
        let credential = self.signer.api_key();
        let path = format!("{PREFIX}{path}");
        let query = encode_sorted_query(query);
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
                    let mut request =
                        HttpRequest::new(method.clone(), path.as_str()).query(query.clone());
                    if let Some(body) = &body {
                        request = request.body(body.clone());
                    }
                    let request = self
                        .signer
                        .sign(request, clock.timestamp_ms(platform, credential));
                    async move { check_label(&self.rest.send(&request).await?) }
                },
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Best effort: accounts already in dual mode, or with open positions,
    /// reject the switch, and trading proceeds either way.
    async fn ensure_dual_mode(&self) -> Result<()> {
        self.session
            .ensure(DUAL_MODE_STEP, || async {
                let result: Result<Value> = self
                    .signed(
                        Method::POST,
                        "/dual_mode",
                        &params(&[("dual_mode", "true")]),
                        None,
                    )
                    .await;
                match result {
                    Ok(_) => info!("Gate dual mode enabled"),
                    Err(e) => debug!(error = %e, "Gate dual mode not switched"),
                }
                Ok(())
            })
            .await
    }

    async fn load_symbols(&self) -> Result<()> {
        let contracts: Vec<ContractEntry> = self.public("/contracts", &Params::new()).await?;
        for contract in contracts {
            let info = symbol_info_from(contract);
            self.symbols.insert(info.symbol.clone(), info);
        }
        debug!(count = self.symbols.len(), "Loaded Gate contracts");
        Ok(())
    }

    /// Base quantity per contract, 1 when the contract cannot be loaded.
    async fn multiplier(&self, symbol: &str) -> Decimal {
        match self.get_symbol_info(symbol).await {
            Ok(info) => info.contract_size,
            Err(e) => {
                warn!(symbol, error = %e, "Missing Gate quanto multiplier, assuming 1");
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

    async fn submit(&self, body: Map<String, Value>) -> Result<OrderEntry> {
        self.signed(Method::POST, "/orders", &Params::new(), Some(Value::Object(body)))
            .await
    }

    /// Close the whole `side` position with `auto_size`.
    async fn close_all(&self, contract: &str, side: PositionSide) -> Result<OrderEntry> {
        let mut body = Map::new();
        body.insert("contract".into(), json!(contract));
        body.insert("size".into(), json!(0));
        body.insert("price".into(), json!("0"));
        body.insert("tif".into(), json!("ioc"));
        body.insert("reduce_only".into(), json!(true));
        body.insert("auto_size".into(), json!(format!("close_{}", side.as_lower())));
        self.submit(body).await
    }

    async fn list_orders(&self, query: Params) -> Result<Vec<Order>> {
        let entries: Vec<OrderEntry> = self.signed(Method::GET, "/orders", &query, None).await?;
        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            let multiplier = self.multiplier(&entry.contract).await;
            orders.push(order_from(entry, multiplier));
        }
        Ok(orders)
    }
}

#[async_trait]
impl ExchangeClient for GateClient {
    fn name(&self) -> &str {
        "gate"
    }

    fn platform(&self) -> Platform {
        Platform::Gate
    }

    async fn get_balance(&self) -> Result<Balance> {
        let account: Account = self
            .signed(Method::GET, "/accounts", &Params::new(), None)
            .await?;
        Ok(balance_from(account))
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let entries: Vec<TickerEntry> = self
            .public("/tickers", &params(&[("contract", contract.as_str())]))
            .await?;
        let raw = entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::Validation(format!("no ticker for {contract}")))?;
        Ok(ticker_from(raw, now_ms()))
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let limit = limit.to_string();
        let interval = interval.trim().to_lowercase();
        let candles: Vec<Candle> = self
            .public(
                "/candlesticks",
                &params(&[
                    ("contract", contract.as_str()),
                    ("interval", interval.as_str()),
                    ("limit", limit.as_str()),
                ]),
            )
            .await?;
        let multiplier = self.multiplier(symbol).await;
        let mut klines: Vec<Kline> = candles
            .into_iter()
            .map(|c| kline_from(c, &interval, multiplier))
            .collect();
        klines.sort_by_key(|k| k.open_time);
        Ok(klines)
    }

    async fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        self.ensure_dual_mode().await?;
        let entries: Vec<PositionEntry> = self
            .signed(
                Method::GET,
                "/positions",
                &params(&[("holding", "true")]),
                None,
            )
            .await?;

        let wanted = symbol.map(SymbolFormat::normalize);
        let mut positions = Vec::new();
        for entry in entries.into_iter().filter(|e| !e.size.is_zero()) {
            let canonical = SymbolFormat::from_venue(&entry.contract);
            if wanted.as_deref().is_some_and(|w| w != canonical) {
                continue;
            }
            let multiplier = self.multiplier(&canonical).await;
            positions.push(position_from(entry, multiplier));
        }
        Ok(positions)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        self.ensure_dual_mode().await?;
        let contract = SymbolFormat::to_venue(Platform::Gate, &request.symbol);
        let rules = self.get_symbol_info(&request.symbol).await?;

        let contracts = contracts_for(&rules, request.quantity, request.reduce_only);
        if contracts <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "quantity {} is below one contract of {contract} (multiplier {})",
                request.quantity, rules.contract_size
            )));
        }
        let size = signed_size(contract.as_str(), contracts, request.side)?;
        let price = request.price.map(|p| rules.round_price(p, request.side));

        let mut body = Map::new();
        body.insert("contract".into(), json!(contract));
        body.insert("size".into(), json!(size));
        body.insert("reduce_only".into(), json!(request.reduce_only));
        match (request.order_type, price) {
            (OrderType::Limit, Some(price)) => {
                body.insert("price".into(), json!(format_decimal(price)));
                body.insert("tif".into(), json!("gtc"));
            }
            _ => {
                body.insert("price".into(), json!("0"));
                body.insert("tif".into(), json!("ioc"));
            }
        }
        let client_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(OrderRequest::new_client_order_id);
        body.insert("text".into(), json!(client_text(&client_id)));

        let placed = self.submit(body).await?;
        info!(
            contract = %contract,
            size = %size,
            reduce_only = request.reduce_only,
            order_id = %placed.id,
            "Gate order placed"
        );

        let mut order = order_from(placed, rules.contract_size);
        order.position_side = Some(request.effective_position_side());
        order.order_type = request.order_type;
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Order> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let cancelled: OrderEntry = self
            .signed(
                Method::DELETE,
                &format!("/orders/{order_id}"),
                &params(&[("contract", contract.as_str())]),
                None,
            )
            .await?;
        let multiplier = self.multiplier(symbol).await;
        let mut order = order_from(cancelled, multiplier);
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

        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let size = self.position_size(symbol, side).await?;
        match self.close_all(&contract, side).await {
            Ok(placed) => {
                info!(contract = %contract, side = %side, order_id = %placed.id, "Gate position closed");
                let multiplier = self.multiplier(symbol).await;
                let mut order = order_from(placed, multiplier);
                order.position_side = Some(side);
                if order.quantity.is_zero() {
                    order.quantity = size;
                }
                Ok(order)
            }
            Err(e) => {
                warn!(contract = %contract, side = %side, error = %e, "auto_size close failed, using reduce-only order");
                self.create_order(&OrderRequest::close(symbol, side, size))
                    .await
            }
        }
    }

    /// Leverage goes in both the query and the body; some deployments only
    /// read one of them.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let _: Value = self
            .signed(
                Method::POST,
                &format!("/positions/{contract}/leverage"),
                &params(&[("leverage", leverage.to_string())]),
                Some(json!({"leverage": leverage})),
            )
            .await?;
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, mode: MarginMode) -> Result<()> {
        match mode {
            MarginMode::Isolated => Ok(()),
            MarginMode::Crossed => Err(Error::Validation(format!(
                "Gate positions for {symbol} use isolated margin only"
            ))),
        }
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let mut query = params(&[("status", "open")]);
        if let Some(symbol) = symbol {
            query.push(("contract".into(), SymbolFormat::to_venue(Platform::Gate, symbol)));
        }
        self.list_orders(query).await
    }

    async fn get_order_history(&self, symbol: &str, limit: u32) -> Result<Vec<Order>> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let limit = limit.to_string();
        self.list_orders(params(&[
            ("status", "finished"),
            ("contract", contract.as_str()),
            ("limit", limit.as_str()),
        ]))
        .await
    }

    async fn get_trade_history(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let mut query = params(&[("contract", contract.as_str())]);
        if limit > 0 {
            query.push(("limit".into(), limit.to_string()));
        }
        let entries: Vec<TradeEntry> = self
            .signed(Method::GET, "/my_trades", &query, None)
            .await?;

        let multiplier = self.multiplier(symbol).await;
        let mut trades: Vec<Trade> = entries
            .into_iter()
            .map(|entry| trade_from(entry, multiplier))
            .collect();
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
            .ok_or_else(|| Error::Validation(format!("unknown Gate contract {canonical}")))
    }
}

// ----------------------------------------------------------------------
// Mapping
// ----------------------------------------------------------------------

/// Parse a Gate body; an object carrying `label` is an API error even on
/// HTTP 200.
fn check_label(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body)?;
    let labelled = value
        .get("label")
        .and_then(Value::as_str)
        .is_some_and(|label| !label.trim().is_empty());
    if labelled {
        return Err(Error::Api(ApiError::from_response(Platform::Gate, 200, body)));
    }
    Ok(value)
}

/// Unix seconds, possibly fractional, to milliseconds.
pub(crate) fn secs_to_ms(secs: Decimal) -> i64 {
    i64::try_from((secs * Decimal::ONE_THOUSAND).trunc()).unwrap_or(0)
}

fn client_text(client_id: &str) -> String {
    if client_id.starts_with(TEXT_PREFIX) {
        client_id.to_string()
    } else {
        format!("{TEXT_PREFIX}{client_id}")
    }
}

/// Contracts for a base quantity on the `order_size_round` grid, at least
/// `order_size_min` when opening; reduce-only sizes floor.
fn contracts_for(rules: &SymbolInfo, quantity: Decimal, reduce_only: bool) -> Decimal {
    if rules.contract_size <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (rules.round_quantity(quantity, reduce_only) / rules.contract_size)
        .trunc()
        .normalize()
}

/// Gate's `total` excludes unrealised PnL; equity is their sum.
fn balance_from(raw: Account) -> Balance {
    Balance {
        total_balance: raw.total + raw.unrealised_pnl,
        available_balance: raw.available,
        frozen_balance: raw.position_margin + raw.order_margin,
        unrealized_pnl: raw.unrealised_pnl,
        currency: if raw.currency.is_empty() {
            SETTLE.into()
        } else {
            raw.currency.to_uppercase()
        },
    }
}

pub(crate) fn ticker_from(raw: TickerEntry, timestamp: i64) -> Ticker {
    Ticker {
        symbol: SymbolFormat::from_venue(&raw.contract),
        last_price: raw.last,
        mark_price: raw.mark_price,
        index_price: raw.index_price,
        bid_price: raw.highest_bid,
        ask_price: raw.lowest_ask,
        high_24h: raw.high_24h,
        low_24h: raw.low_24h,
        volume_24h: raw.volume_24h_base,
        quote_volume_24h: raw.volume_24h_quote,
        change_24h: raw.change_percentage,
        timestamp,
    }
}

pub(crate) fn kline_from(raw: Candle, interval: &str, multiplier: Decimal) -> Kline {
    let open_time = raw.t * 1000;
    Kline {
        open_time,
        open: raw.o,
        high: raw.h,
        low: raw.l,
        close: raw.c,
        volume: raw.v * multiplier,
        close_time: kline_close_time(open_time, interval),
    }
}

fn position_from(raw: PositionEntry, multiplier: Decimal) -> Position {
    let side = match raw.mode.as_str() {
        "dual_long" => PositionSide::Long,
        "dual_short" => PositionSide::Short,
        _ if raw.size < Decimal::ZERO => PositionSide::Short,
        _ => PositionSide::Long,
    };
    let (margin_type, leverage) = if raw.leverage == 0 {
        (MarginMode::Crossed, raw.cross_leverage_limit)
    } else {
        (MarginMode::Isolated, raw.leverage)
    };
    let mut position = Position::new(
        SymbolFormat::from_venue(&raw.contract),
        side,
        raw.size * multiplier,
    );
    position.entry_price = raw.entry_price;
    position.mark_price = raw.mark_price;
    position.unrealized_pnl = raw.unrealised_pnl;
    position.leverage = leverage;
    position.margin_type = margin_type;
    position.margin = raw.margin;
    position.isolated_margin = raw.margin;
    position.liquidation_price = raw.liq_price;
    position
}

fn order_status(raw: &OrderEntry) -> OrderStatus {
    let filled_any = raw.left.abs() < raw.size.abs();
    match (raw.status.as_str(), raw.finish_as.as_str()) {
        ("open", _) if filled_any => OrderStatus::PartiallyFilled,
        ("open", _) => OrderStatus::New,
        ("finished", "filled") => OrderStatus::Filled,
        ("finished", "ioc" | "cancelled" | "reduce_only" | "position_closed" | "stp") => {
            if raw.left.is_zero() {
                OrderStatus::Filled
            } else {
                OrderStatus::Canceled
            }
        }
        ("finished", "liquidated" | "auto_deleveraged") => OrderStatus::Filled,
        (status, _) => OrderStatus::from_venue(status),
    }
}

fn order_from(raw: OrderEntry, multiplier: Decimal) -> Order {
    let status = order_status(&raw);
    let contracts = raw.size.abs();
    let filled = (contracts - raw.left.abs()).max(Decimal::ZERO);
    let side = if raw.size < Decimal::ZERO {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    };
    let order_type = if raw.price.is_zero() || raw.tif == "ioc" {
        OrderType::Market
    } else {
        OrderType::Limit
    };
    let position_side = match (side, raw.is_reduce_only) {
        (OrderSide::Buy, false) | (OrderSide::Sell, true) => PositionSide::Long,
        (OrderSide::Sell, false) | (OrderSide::Buy, true) => PositionSide::Short,
    };
    let create_time = secs_to_ms(raw.create_time);
    let update_time = secs_to_ms(raw.finish_time);
    Order {
        order_id: raw.id,
        client_id: raw.text,
        symbol: SymbolFormat::from_venue(&raw.contract),
        side,
        position_side: Some(position_side),
        order_type,
        price: raw.price,
        quantity: contracts * multiplier,
        filled_qty: filled * multiplier,
        avg_price: raw.fill_price,
        status,
        fee: Decimal::ZERO,
        fee_coin: SETTLE.into(),
        create_time,
        update_time: if update_time > 0 { update_time } else { create_time },
    }
}

/// Fills name their position side only through `close_size`: a negative
/// value closes a long, a positive one a short. Opening fills follow the
/// trade direction.
fn trade_from(raw: TradeEntry, multiplier: Decimal) -> Trade {
    let side = if raw.size < Decimal::ZERO {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    };
    let position_side = if raw.close_size < Decimal::ZERO {
        PositionSide::Long
    } else if raw.close_size > Decimal::ZERO {
        PositionSide::Short
    } else if side == OrderSide::Buy {
        PositionSide::Long
    } else {
        PositionSide::Short
    };
    Trade {
        trade_id: raw.id,
        order_id: raw.order_id,
        symbol: SymbolFormat::from_venue(&raw.contract),
        side,
        position_side: Some(position_side),
        price: raw.price,
        quantity: raw.size.abs() * multiplier,
        realized_pnl: raw.pnl,
        commission: raw.fee.abs(),
        commission_asset: SETTLE.into(),
        time: secs_to_ms(raw.create_time),
    }
}

fn symbol_info_from(raw: ContractEntry) -> SymbolInfo {
    let mut info = SymbolInfo::new(&raw.name);
    let multiplier = if raw.quanto_multiplier > Decimal::ZERO {
        raw.quanto_multiplier
    } else if raw.contract_size > Decimal::ZERO {
        raw.contract_size
    } else {
        Decimal::ONE
    };
    let round = raw.order_size_round.max(Decimal::ONE);
    let min = raw.order_size_min.max(Decimal::ONE);
    info.contract_size = multiplier;
    info.tick_size = raw.order_price_round;
    info.price_precision = decimals_of(raw.order_price_round);
    info.step_size = (round * multiplier).normalize();
    info.qty_precision = decimals_of(info.step_size);
    info.min_qty = (min * multiplier).normalize();
    info.max_leverage = raw.leverage_max;
    info
}

/// Gate encodes direction in the sign of the contract count.
fn signed_size(contract: &str, contracts: Decimal, side: OrderSide) -> Result<i64> {
    let size = match side {
        OrderSide::Buy => contracts,
        OrderSide::Sell => -contracts,
    };
    i64::try_from(size).map_err(|_| {
        Error::Validation(format!("{contracts} contracts of {contract} is out of range"))
    })
}
