//! Gate v4 private futures channels.
//!
//! There is no login frame: each subscribe carries its own `auth` block, so
//! the frames are signed afresh on every connect. Order and position channels
//! are subscribed per contract.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::market::{GateFrame, PUBLIC_WS_URL};
use super::signer::GateSigner;
use crate::adapter::de::parse_decimal;
use crate::adapter::session_stream::{Inbound, PrivateProtocol, SessionStream};
use crate::config::ExchangeConfig;
use crate::domain::{Balance, Platform, PrivateEvent, PrivateEventKind, SymbolFormat};
use crate::infrastructure::{Heartbeat, Services};

const ORDERS: &str = "futures.orders";
const POSITIONS: &str = "futures.positions";

pub type GatePrivateStream = SessionStream<GatePrivateProtocol>;

pub struct GatePrivateProtocol {
    signer: GateSigner,
    services: Arc<Services>,
    url: String,
}

impl GatePrivateProtocol {
    #[must_use]
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Self {
        Self {
            signer: GateSigner::new(&account.api_key, &account.secret_key),
            services,
            url: account
                .private_ws_url
                .clone()
                .unwrap_or_else(|| PUBLIC_WS_URL.into()),
        }
    }

    fn timestamp_secs(&self) -> i64 {
        self.services
            .clock
            .timestamp_ms(Platform::Gate, self.signer.api_key())
            / 1000
    }
}

impl SessionStream<GatePrivateProtocol> {
    #[must_use]
    pub fn for_account(account: &ExchangeConfig, services: &Arc<Services>) -> Self {
        Self::new(
            GatePrivateProtocol::new(account, Arc::clone(services)),
            services.connection.clone(),
        )
    }
}

impl PrivateProtocol for GatePrivateProtocol {
    fn platform(&self) -> Platform {
        Platform::Gate
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::Ping
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(20)
    }

    fn login(&self) -> Option<String> {
        None
    }

    fn account_subscriptions(&self) -> Vec<String> {
        Vec::new()
    }

    fn symbol_subscriptions(&self, symbol: &str, subscribe: bool) -> Vec<String> {
        let contract = SymbolFormat::to_venue(Platform::Gate, symbol);
        let event = if subscribe { "subscribe" } else { "unsubscribe" };
        let time = self.timestamp_secs();
        [ORDERS, POSITIONS]
            .into_iter()
            .map(|channel| {
                self.signer
                    .channel_frame(channel, event, vec![json!(contract)], time)
            })
            .collect()
    }

    fn decode(&self, text: &str) -> Inbound {
        decode_frame(text)
    }
}

fn decode_frame(text: &str) -> Inbound {
    let Ok(frame) = serde_json::from_str::<GateFrame>(text) else {
        return Inbound::Ignored;
    };
    if let Some(error) = frame.error.as_ref().filter(|e| !e.is_null()) {
        return Inbound::Rejected(format!("{} {}: {error}", frame.channel, frame.event));
    }
    if frame.event != "update" {
        return Inbound::Ignored;
    }

    let kind = match frame.channel.as_str() {
        ORDERS => PrivateEventKind::Order,
        POSITIONS => PrivateEventKind::Position,
        "futures.balances" | "futures.account" => PrivateEventKind::Account,
        _ => return Inbound::Ignored,
    };

    if kind == PrivateEventKind::Account {
        let balance = frame.items().first().copied().map(balance_from);
        return Inbound::Events(vec![
            PrivateEvent::new(Platform::Gate, kind, String::new(), text).with_balance(balance)
        ]);
    }

    Inbound::Events(
        frame
            .items()
            .into_iter()
            .map(|item| {
                let contract = item.get("contract").and_then(Value::as_str).unwrap_or_default();
                PrivateEvent::new(Platform::Gate, kind, SymbolFormat::from_venue(contract), text)
            })
            .collect(),
    )
}

/// Balance pushes carry only the wallet total after the change.
fn balance_from(item: &Value) -> Balance {
    let currency = item
        .get("currency")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or("USDT")
        .to_uppercase();
    Balance {
        total_balance: item.get("balance").map(parse_decimal).unwrap_or_default(),
        currency,
        ..Balance::default()
    }
}
