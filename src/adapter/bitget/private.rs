//! Bitget v2 private channels: orders, positions and account.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::client::PRODUCT_TYPE;
use super::signer::BitgetSigner;
use crate::adapter::de::parse_decimal;
use crate::adapter::session_stream::{ArgFrame, Inbound, PrivateProtocol, SessionStream};
use crate::config::ExchangeConfig;
use crate::domain::{Balance, Platform, PrivateEvent, PrivateEventKind, SymbolFormat};
use crate::infrastructure::{Heartbeat, Services};

pub const PRIVATE_WS_URL: &str = "wss://ws.bitget.com/v2/ws/private";

pub type BitgetPrivateStream = SessionStream<BitgetPrivateProtocol>;

pub struct BitgetPrivateProtocol {
    signer: BitgetSigner,
    services: Arc<Services>,
    url: String,
}

impl BitgetPrivateProtocol {
    #[must_use]
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Self {
        Self {
            signer: BitgetSigner::new(&account.api_key, &account.secret_key, &account.passphrase),
            services,
            url: account
                .private_ws_url
                .clone()
                .unwrap_or_else(|| PRIVATE_WS_URL.into()),
        }
    }

    fn frame(op: &str, args: Vec<Value>) -> String {
        json!({"op": op, "args": args}).to_string()
    }
}

impl SessionStream<BitgetPrivateProtocol> {
    #[must_use]
    pub fn for_account(account: &ExchangeConfig, services: &Arc<Services>) -> Self {
        Self::new(
            BitgetPrivateProtocol::new(account, Arc::clone(services)),
            services.connection.clone(),
        )
    }
}

impl PrivateProtocol for BitgetPrivateProtocol {
    fn platform(&self) -> Platform {
        Platform::Bitget
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Text("ping".into())
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }

    fn login(&self) -> Option<String> {
        let millis = self
            .services
            .clock
            .timestamp_ms(Platform::Bitget, self.signer.api_key());
        Some(self.signer.login_frame(millis / 1000))
    }

    fn account_subscriptions(&self) -> Vec<String> {
        vec![Self::frame(
            "subscribe",
            vec![json!({"instType": PRODUCT_TYPE, "channel": "account", "coin": "default"})],
        )]
    }

    fn symbol_subscriptions(&self, symbol: &str, subscribe: bool) -> Vec<String> {
        let native = SymbolFormat::to_venue(Platform::Bitget, symbol);
        let args = ["orders", "positions"]
            .iter()
            .map(|channel| json!({"instType": PRODUCT_TYPE, "channel": channel, "instId": native}))
            .collect();
        let op = if subscribe { "subscribe" } else { "unsubscribe" };
        vec![Self::frame(op, args)]
    }

    fn decode(&self, text: &str) -> Inbound {
        decode_frame(text)
    }
}

fn decode_frame(text: &str) -> Inbound {
    let Ok(frame) = serde_json::from_str::<ArgFrame>(text) else {
        return Inbound::Ignored;
    };
    if let Some(control) = frame.control() {
        return control;
    }
    let Some(arg) = &frame.arg else {
        return Inbound::Ignored;
    };

    let kind = match arg.channel.as_str() {
        "orders" => PrivateEventKind::Order,
        "positions" => PrivateEventKind::Position,
        "account" => PrivateEventKind::Account,
        _ => return Inbound::Ignored,
    };
    let symbol = if kind == PrivateEventKind::Account {
        String::new()
    } else {
        frame.symbol()
    };
    let balance = if kind == PrivateEventKind::Account {
        frame.data.iter().find_map(account_balance)
    } else {
        None
    };
    Inbound::Events(vec![
        PrivateEvent::new(Platform::Bitget, kind, symbol, text).with_balance(balance)
    ])
}

fn account_balance(item: &Value) -> Option<Balance> {
    let coin = item.get("marginCoin").and_then(Value::as_str)?;
    if !coin.eq_ignore_ascii_case("USDT") {
        return None;
    }
    let field = |name: &str| item.get(name).map_or(Decimal::ZERO, parse_decimal);
    let equity = field("equity");
    let total = if equity.is_zero() {
        field("usdtEquity")
    } else {
        equity
    };
    Some(Balance {
        total_balance: total,
        available_balance: field("available"),
        frozen_balance: field("frozen"),
        unrealized_pnl: field("unrealizedPL"),
        currency: coin.to_uppercase(),
    })
}
