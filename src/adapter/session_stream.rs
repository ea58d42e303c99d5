//! Private streams that authenticate over the socket itself.
//!
//! Bitget and OKX log in with a signed frame after every (re)connect and
//! subscribe once the venue acknowledges it; Gate signs each subscribe frame
//! instead. Either way the frames carry a fresh timestamp, so they are rebuilt
//! on every connect rather than replayed from the saved-subscription list.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::EventSink;
use crate::config::ConnectionConfig;
use crate::domain::{Platform, PrivateEvent, SymbolFormat};
use crate::error::Result;
use crate::infrastructure::{ConnectionManager, Heartbeat};
use crate::port::{EventHandler, PrivateStream};

/// What a private frame means to the session.
#[derive(Debug)]
pub enum Inbound {
    /// Login acknowledged; subscriptions may be sent.
    LoggedIn,
    /// Login or subscription refused by the venue.
    Rejected(String),
    Events(Vec<PrivateEvent>),
    Ignored,
}

/// Venue wire format for an authenticated push stream.
pub trait PrivateProtocol: Send + Sync + 'static {
    fn platform(&self) -> Platform;

    fn url(&self) -> String;

    fn heartbeat(&self) -> Heartbeat;

    fn ping_interval(&self) -> Duration;

    /// Signed login frame, or `None` when subscriptions carry their own auth.
    fn login(&self) -> Option<String>;

    /// Account-wide subscriptions sent once authenticated.
    fn account_subscriptions(&self) -> Vec<String>;

    /// Per-symbol (un)subscribe frames. Empty on account-wide venues.
    fn symbol_subscriptions(&self, symbol: &str, subscribe: bool) -> Vec<String>;

    fn decode(&self, text: &str) -> Inbound;
}

/// `{"event": .., "code": .., "arg": {..}, "data": [..]}` envelope shared by
/// Bitget and OKX pushes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ArgFrame {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub arg: Option<FrameArg>,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FrameArg {
    #[serde(default)]
    pub channel: String,
    #[serde(default, rename = "instId")]
    pub inst_id: String,
}

impl ArgFrame {
    /// `code` is `0`, `"0"` or `"00000"`.
    pub(crate) fn is_success(&self) -> bool {
        match &self.code {
            Value::Number(n) => n.as_i64() == Some(0),
            Value::String(s) => s == "0" || s == "00000",
            Value::Null => true,
            _ => false,
        }
    }

    /// Canonical symbol from `arg.instId`, else from the first data item.
    pub(crate) fn symbol(&self) -> String {
        let inst = self
            .arg
            .as_ref()
            .map(|arg| arg.inst_id.as_str())
            .filter(|inst| !inst.is_empty())
            .or_else(|| {
                self.data
                    .first()
                    .and_then(|item| item.get("instId"))
                    .and_then(Value::as_str)
            })
            .unwrap_or_default();
        SymbolFormat::from_venue(inst)
    }

    /// Login/subscribe acknowledgements and errors.
    pub(crate) fn control(&self) -> Option<Inbound> {
        match self.event.as_deref()? {
            "login" if self.is_success() => Some(Inbound::LoggedIn),
            "login" | "error" => Some(Inbound::Rejected(format!(
                "code={} msg={}",
                self.code, self.msg
            ))),
            _ => Some(Inbound::Ignored),
        }
    }
}

struct Shared<P> {
    protocol: P,
    events: EventSink,
    symbols: Mutex<BTreeSet<String>>,
    ready: AtomicBool,
}

impl<P: PrivateProtocol> Shared<P> {
    fn subscriptions(&self) -> Vec<String> {
        let mut frames = self.protocol.account_subscriptions();
        for symbol in self.symbols.lock().iter() {
            frames.extend(self.protocol.symbol_subscriptions(symbol, true));
        }
        frames
    }

    fn on_connected(&self, connection: &ConnectionManager) {
        self.ready.store(false, Ordering::SeqCst);
        let frames = match self.protocol.login() {
            Some(login) => vec![login],
            None => {
                self.ready.store(true, Ordering::SeqCst);
                self.subscriptions()
            }
        };
        send_all(connection, frames);
    }

    fn on_message(&self, connection: &ConnectionManager, text: &str) {
        let platform = self.protocol.platform();
        match self.protocol.decode(text) {
            Inbound::LoggedIn => {
                info!(platform = %platform, "Private stream authenticated");
                self.ready.store(true, Ordering::SeqCst);
                send_all(connection, self.subscriptions());
            }
            Inbound::Rejected(reason) => {
                warn!(platform = %platform, reason = %reason, "Private stream request rejected");
            }
            Inbound::Events(events) => {
                for event in events {
                    self.events.emit(event);
                }
            }
            Inbound::Ignored => {}
        }
    }
}

fn send_all(connection: &ConnectionManager, frames: Vec<String>) {
    if frames.is_empty() {
        return;
    }
    let connection = connection.clone();
    tokio::spawn(async move {
        for frame in frames {
            if let Err(e) = connection.send(frame).await {
                warn!(connection = %connection.name(), error = %e, "Private frame not delivered");
                return;
            }
        }
    });
}

/// [`PrivateStream`] over one authenticated socket.
pub struct SessionStream<P: PrivateProtocol> {
    shared: Arc<Shared<P>>,
    config: ConnectionConfig,
    connection: tokio::sync::Mutex<Option<ConnectionManager>>,
    running: Arc<AtomicBool>,
}

impl<P: PrivateProtocol> SessionStream<P> {
    #[must_use]
    pub fn new(protocol: P, config: ConnectionConfig) -> Self {
        let config = config.with_ping_interval(protocol.ping_interval());
        Self {
            shared: Arc::new(Shared {
                protocol,
                events: EventSink::default(),
                symbols: Mutex::new(BTreeSet::new()),
                ready: AtomicBool::new(false),
            }),
            config,
            connection: tokio::sync::Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> &P {
        &self.shared.protocol
    }

    /// Symbols currently tracked, canonical form.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.shared.symbols.lock().iter().cloned().collect()
    }

    async fn send_for_symbol(&self, symbol: &str, subscribe: bool) -> Result<()> {
        if !self.shared.ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        let connection = self.connection.lock().await.clone();
        let Some(connection) = connection else {
            return Ok(());
        };
        for frame in self.shared.protocol.symbol_subscriptions(symbol, subscribe) {
            connection.send(frame).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<P: PrivateProtocol> PrivateStream for SessionStream<P> {
    fn platform(&self) -> Platform {
        self.shared.protocol.platform()
    }

    async fn start(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let platform = self.platform();
        let connection = ConnectionManager::new(
            format!("{platform}-private"),
            self.shared.protocol.url(),
            self.config.clone(),
            self.shared.protocol.heartbeat(),
        );

        let shared = Arc::clone(&self.shared);
        connection.on_connected(move |conn| shared.on_connected(conn));
        let shared = Arc::clone(&self.shared);
        connection.on_message(move |conn, text| shared.on_message(conn, &text));
        let shared = Arc::clone(&self.shared);
        connection.on_disconnected(move |reason| {
            shared.ready.store(false, Ordering::SeqCst);
            warn!(platform = %platform, reason, "Private stream disconnected");
        });
        let running = Arc::clone(&self.running);
        connection.on_terminal_failure(move |reason| {
            running.store(false, Ordering::SeqCst);
            warn!(platform = %platform, reason, "Private stream gave up reconnecting");
        });

        connection.connect().await?;
        *slot = Some(connection);
        self.running.store(true, Ordering::SeqCst);
        info!(platform = %platform, "Private stream started");
        Ok(())
    }

    async fn stop(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
        self.shared.ready.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        debug!(platform = %self.platform(), "Private stream stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn add_symbol(&self, symbol: &str) -> Result<()> {
        let symbol = SymbolFormat::normalize(symbol);
        if !self.shared.symbols.lock().insert(symbol.clone()) {
            return Ok(());
        }
        self.send_for_symbol(&symbol, true).await
    }

    async fn remove_symbol(&self, symbol: &str) -> Result<()> {
        let symbol = SymbolFormat::normalize(symbol);
        if !self.shared.symbols.lock().remove(&symbol) {
            return Ok(());
        }
        self.send_for_symbol(&symbol, false).await
    }

    fn set_on_event(&self, handler: EventHandler) {
        self.shared.events.set(handler);
    }
}
