//! Binance user-data stream.
//!
//! Authorization is a REST-issued listenKey embedded in the socket URL. The
//! key is kept alive every 30 minutes, replaced when the venue reports it
//! expired, and released on [`PrivateStream::stop`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::BinanceClient;
use crate::adapter::{de, EventSink};
use crate::config::{ConnectionConfig, ExchangeConfig};
use crate::domain::{Balance, Platform, PrivateEvent, PrivateEventKind, SymbolFormat};
use crate::error::Result;
use crate::infrastructure::{ConnectionManager, Heartbeat};
use crate::port::{EventHandler, PrivateStream};

pub const PRIVATE_WS_URL: &str = "wss://fstream.binance.com/ws";
pub const TESTNET_PRIVATE_WS_URL: &str = "wss://stream.binancefuture.com/ws";

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30 * 60);
const PING_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum UserFrame {
    #[serde(rename = "ORDER_TRADE_UPDATE")]
    OrderUpdate {
        #[serde(rename = "o")]
        order: OrderPayload,
    },
    #[serde(rename = "ACCOUNT_UPDATE")]
    AccountUpdate {
        #[serde(rename = "a")]
        account: AccountPayload,
    },
    #[serde(rename = "listenKeyExpired")]
    ListenKeyExpired,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct OrderPayload {
    #[serde(rename = "s")]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    #[serde(rename = "B", default)]
    balances: Vec<WalletEntry>,
    #[serde(rename = "P", default)]
    positions: Vec<PositionEntry>,
}

#[derive(Debug, Deserialize)]
struct WalletEntry {
    #[serde(rename = "a")]
    asset: String,
    #[serde(rename = "wb", default, deserialize_with = "de::decimal")]
    wallet: Decimal,
    #[serde(rename = "cw", default, deserialize_with = "de::decimal")]
    cross_wallet: Decimal,
}

#[derive(Debug, Deserialize)]
struct PositionEntry {
    #[serde(rename = "s")]
    symbol: String,
}

struct Shared {
    client: Arc<BinanceClient>,
    ws_base: String,
    events: EventSink,
    listen_key: Mutex<Option<String>>,
}

impl Shared {
    fn stream_url(&self, listen_key: &str) -> String {
        format!("{}/{listen_key}", self.ws_base.trim_end_matches('/'))
    }

    /// Issue a fresh listenKey and point the next reconnect at it.
    async fn renew(&self, connection: &ConnectionManager) {
        match self.client.create_listen_key().await {
            Ok(key) => {
                connection.set_url(self.stream_url(&key));
                *self.listen_key.lock() = Some(key);
                info!("Binance listenKey renewed");
            }
            Err(e) => warn!(error = %e, "Failed to renew Binance listenKey"),
        }
    }

    fn handle_frame(self: &Arc<Self>, connection: &ConnectionManager, text: &str) {
        let frame = match serde_json::from_str::<UserFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable Binance user frame");
                return;
            }
        };
        if matches!(frame, UserFrame::ListenKeyExpired) {
            warn!("Binance listenKey expired");
            let shared = Arc::clone(self);
            let connection = connection.clone();
            tokio::spawn(async move { shared.renew(&connection).await });
            return;
        }
        for event in events_from(frame, text) {
            self.events.emit(event);
        }
    }
}

fn events_from(frame: UserFrame, raw: &str) -> Vec<PrivateEvent> {
    match frame {
        UserFrame::OrderUpdate { order } => vec![PrivateEvent::new(
            Platform::Binance,
            PrivateEventKind::Order,
            SymbolFormat::from_venue(&order.symbol),
            raw,
        )],
        UserFrame::AccountUpdate { account } => {
            let balance = account
                .balances
                .iter()
                .find(|entry| entry.asset == "USDT")
                .map(|entry| Balance {
                    total_balance: entry.wallet,
                    available_balance: entry.cross_wallet,
                    currency: entry.asset.clone(),
                    ..Balance::default()
                });

            let mut events = vec![PrivateEvent::new(
                Platform::Binance,
                PrivateEventKind::Account,
                "",
                raw,
            )
            .with_balance(balance)];

            let mut seen = HashSet::new();
            for position in &account.positions {
                let symbol = SymbolFormat::from_venue(&position.symbol);
                if seen.insert(symbol.clone()) {
                    events.push(PrivateEvent::new(
                        Platform::Binance,
                        PrivateEventKind::Position,
                        symbol,
                        raw,
                    ));
                }
            }
            events
        }
        UserFrame::ListenKeyExpired | UserFrame::Other => Vec::new(),
    }
}

pub struct BinancePrivateStream {
    shared: Arc<Shared>,
    config: ConnectionConfig,
    connection: tokio::sync::Mutex<Option<ConnectionManager>>,
    keepalive: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    running: Arc<AtomicBool>,
}

impl BinancePrivateStream {
    #[must_use]
    pub fn new(client: Arc<BinanceClient>, account: &ExchangeConfig, config: ConnectionConfig) -> Self {
        let ws_base = account.private_ws_url.clone().unwrap_or_else(|| {
            if account.testnet {
                TESTNET_PRIVATE_WS_URL.into()
            } else {
                PRIVATE_WS_URL.into()
            }
        });
        Self {
            shared: Arc::new(Shared {
                client,
                ws_base,
                events: EventSink::default(),
                listen_key: Mutex::new(None),
            }),
            config: config.with_ping_interval(PING_INTERVAL),
            connection: tokio::sync::Mutex::new(None),
            keepalive: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn keepalive_loop(
        shared: Arc<Shared>,
        connection: ConnectionManager,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            let key = shared.listen_key.lock().clone();
            let Some(key) = key else {
                continue;
            };
            match shared.client.keepalive_listen_key(&key).await {
                Ok(()) => debug!("Binance listenKey kept alive"),
                Err(e) => {
                    warn!(error = %e, "listenKey keepalive failed, renewing");
                    shared.renew(&connection).await;
                }
            }
        }
    }
}

#[async_trait]
impl PrivateStream for BinancePrivateStream {
    fn platform(&self) -> Platform {
        Platform::Binance
    }

    async fn start(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let listen_key = self.shared.client.create_listen_key().await?;
        let connection = ConnectionManager::new(
            "binance-private",
            self.shared.stream_url(&listen_key),
            self.config.clone(),
            Heartbeat::Ping,
        );
        *self.shared.listen_key.lock() = Some(listen_key);

        let shared = Arc::clone(&self.shared);
        connection.on_message(move |conn, text| shared.handle_frame(conn, &text));
        connection.on_disconnected(|reason| {
            warn!(reason, "Binance private stream disconnected");
        });
        let running = Arc::clone(&self.running);
        connection.on_terminal_failure(move |reason| {
            running.store(false, Ordering::SeqCst);
            warn!(reason, "Binance private stream gave up reconnecting");
        });
        connection.connect().await?;

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Self::keepalive_loop(
            Arc::clone(&self.shared),
            connection.clone(),
            rx,
        ));
        *self.keepalive.lock() = Some((tx, handle));
        *slot = Some(connection);
        self.running.store(true, Ordering::SeqCst);
        info!("Binance private stream started");
        Ok(())
    }

    async fn stop(&self) {
        let keepalive = self.keepalive.lock().take();
        if let Some((tx, handle)) = keepalive {
            tx.send_replace(true);
            if let Err(e) = handle.await {
                debug!(error = %e, "Keepalive task ended abnormally");
            }
        }

        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.disconnect().await;
        }

        let listen_key = self.shared.listen_key.lock().take();
        if let Some(key) = listen_key {
            if let Err(e) = self.shared.client.close_listen_key(&key).await {
                warn!(error = %e, "Failed to close Binance listenKey");
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Binance private stream stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The user-data stream is account wide; symbols need no subscription.
    async fn add_symbol(&self, _symbol: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_symbol(&self, _symbol: &str) -> Result<()> {
        Ok(())
    }

    fn set_on_event(&self, handler: EventHandler) {
        self.shared.events.set(handler);
    }
}
