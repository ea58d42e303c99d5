//! OKX v5 private channels.
//!
//! Subscriptions are account-wide (`instType: SWAP`), so adding a symbol only
//! records it; pushes for every instrument arrive regardless.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::client::{balance_from, INST_TYPE};
use super::dto::AccountBalance;
use super::signer::OkxSigner;
use crate::adapter::session_stream::{ArgFrame, Inbound, PrivateProtocol, SessionStream};
use crate::config::ExchangeConfig;
use crate::domain::{Platform, PrivateEvent, PrivateEventKind, SymbolFormat};
use crate::infrastructure::{Heartbeat, Services};

pub const PRIVATE_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";

pub type OkxPrivateStream = SessionStream<OkxPrivateProtocol>;

pub struct OkxPrivateProtocol {
    signer: OkxSigner,
    services: Arc<Services>,
    url: String,
}

impl OkxPrivateProtocol {
    #[must_use]
    pub fn new(account: &ExchangeConfig, services: Arc<Services>) -> Self {
        Self {
            signer: OkxSigner::new(
                &account.api_key,
                &account.secret_key,
                &account.passphrase,
                account.testnet,
            ),
            services,
            url: account
                .private_ws_url
                .clone()
                .unwrap_or_else(|| PRIVATE_WS_URL.into()),
        }
    }
}

impl SessionStream<OkxPrivateProtocol> {
    #[must_use]
    pub fn for_account(account: &ExchangeConfig, services: &Arc<Services>) -> Self {
        Self::new(
            OkxPrivateProtocol::new(account, Arc::clone(services)),
            services.connection.clone(),
        )
    }
}

impl PrivateProtocol for OkxPrivateProtocol {
    fn platform(&self) -> Platform {
        Platform::Okx
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
            .timestamp_ms(Platform::Okx, self.signer.api_key());
        Some(self.signer.login_frame(millis / 1000))
    }

    fn account_subscriptions(&self) -> Vec<String> {
        let args = vec![
            json!({"channel": "orders", "instType": INST_TYPE}),
            json!({"channel": "positions", "instType": INST_TYPE}),
            json!({"channel": "account"}),
        ];
        vec![json!({"op": "subscribe", "args": args}).to_string()]
    }

    fn symbol_subscriptions(&self, _symbol: &str, _subscribe: bool) -> Vec<String> {
        Vec::new()
    }

    fn decode(&self, text: &str) -> Inbound {
        decode_frame(text)
    }
}

/// One event per data item; orders and positions of several instruments can
/// share a push.
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

    if kind == PrivateEventKind::Account {
        let balance = frame
            .data
            .first()
            .and_then(|item| serde_json::from_value::<AccountBalance>(item.clone()).ok())
            .map(balance_from);
        return Inbound::Events(vec![
            PrivateEvent::new(Platform::Okx, kind, String::new(), text).with_balance(balance)
        ]);
    }

    Inbound::Events(
        frame
            .data
            .iter()
            .map(|item| {
                let inst = item.get("instId").and_then(Value::as_str).unwrap_or_default();
                PrivateEvent::new(
                    Platform::Okx,
                    kind,
                    SymbolFormat::from_venue(inst),
                    text,
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn protocol() -> OkxPrivateProtocol {
        let account = ExchangeConfig::new("okx", Platform::Okx, "key", "secret").with_passphrase("phrase");
        OkxPrivateProtocol::new(&account, Arc::new(Services::default()))
    }

    #[test]
    fn test_account_wide_subscriptions() {
        let protocol = protocol();
        assert!(protocol.symbol_subscriptions("BTCUSDT", true).is_empty());

        let frames = protocol.account_subscriptions();
        let frame: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(frame["args"][0]["channel"], "orders");
        assert_eq!(frame["args"][1]["instType"], "SWAP");
        assert_eq!(frame["args"][2]["channel"], "account");
    }

    #[test]
    fn test_login_frame() {
        let frame: Value = serde_json::from_str(&protocol().login().unwrap()).unwrap();
        assert_eq!(frame["op"], "login");
        assert_eq!(frame["args"][0]["passphrase"], "phrase");
    }

    #[test]
    fn test_decode_multi_instrument_positions() {
        let Inbound::Events(events) = decode_frame(
            r#"{"arg":{"channel":"positions","instType":"SWAP","uid":"1"},
                "data":[{"instId":"BTC-USDT-SWAP","pos":"1"},{"instId":"ETH-USDT-SWAP","pos":"2"}]}"#,
        ) else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].symbol, "BTCUSDT");
        assert_eq!(events[1].symbol, "ETHUSDT");
        assert_eq!(events[1].kind, PrivateEventKind::Position);
    }

    #[test]
    fn test_decode_account_balance() {
        let Inbound::Events(events) = decode_frame(
            r#"{"arg":{"channel":"account","uid":"1"},"data":[{"totalEq":"2000",
                "details":[{"ccy":"USDT","eq":"2000","availEq":"1800","frozenBal":"200","upl":"12"}]}]}"#,
        ) else {
            panic!("expected events");
        };
        let balance = events[0].balance.as_ref().unwrap();
        assert_eq!(balance.total_balance, dec!(2000));
        assert_eq!(balance.available_balance, dec!(1800));
        assert_eq!(balance.unrealized_pnl, dec!(12));
    }

    #[test]
    fn test_decode_login_events() {
        assert!(matches!(
            decode_frame(r#"{"event":"login","code":"0","msg":"","connId":"a"}"#),
            Inbound::LoggedIn
        ));
        assert!(matches!(
            decode_frame(r#"{"event":"error","code":"60009","msg":"Login failed."}"#),
            Inbound::Rejected(_)
        ));
    }
}
