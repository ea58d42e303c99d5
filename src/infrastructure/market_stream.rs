//! Public market data over WebSocket.
//!
//! [`PublicMarketStream`] is venue-agnostic: a [`MarketProtocol`] supplies the
//! endpoint, subscribe frames and frame decoding, while the stream owns the
//! connections and the ticker and kline caches. A connection is opened on the
//! first subscription for its endpoint and torn down when its last
//! subscription goes away.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::connection::{ConnectionManager, Heartbeat};
use crate::config::ConnectionConfig;
use crate::domain::{Kline, Platform, SymbolFormat, Ticker};
use crate::error::Result;

/// Klines kept per (symbol, interval).
pub const KLINE_CACHE_LIMIT: usize = 500;

/// Which kind of data a subscription carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ticker,
    Kline,
}

/// A subscribe or unsubscribe frame with the key it is replayed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub key: String,
    pub subscribe: String,
    pub unsubscribe: String,
}

/// Decoded public frame, already normalized to canonical symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketMessage {
    /// Ticker fields; a zero `mark_price` means "not carried by this frame".
    Ticker(Ticker),
    MarkPrice {
        symbol: String,
        mark_price: rust_decimal::Decimal,
        index_price: rust_decimal::Decimal,
        timestamp: i64,
    },
    Kline {
        symbol: String,
        interval: String,
        kline: Kline,
    },
}

/// Venue wire format for public channels.
pub trait MarketProtocol: Send + Sync + 'static {
    fn platform(&self) -> Platform;

    /// Endpoint serving `channel`.
    fn endpoint(&self, channel: Channel) -> String;

    fn heartbeat(&self) -> Heartbeat;

    fn ping_interval(&self) -> Duration;

    /// Frames for the ticker (and mark price, where separate) of `symbol`.
    fn ticker_subscriptions(&self, symbol: &str) -> Vec<Subscription>;

    fn kline_subscription(&self, symbol: &str, interval: &str) -> Subscription;

    /// Decode one text frame. Acks, pongs and unknown frames yield nothing.
    fn decode(&self, text: &str) -> Vec<MarketMessage>;
}

pub type TickerHandler = Arc<dyn Fn(&Ticker) + Send + Sync>;
pub type KlineHandler = Arc<dyn Fn(&str, &str, &Kline) + Send + Sync>;

struct StreamInner {
    protocol: Arc<dyn MarketProtocol>,
    config: ConnectionConfig,
    connections: tokio::sync::Mutex<HashMap<String, ConnectionManager>>,
    tickers: DashMap<String, Ticker>,
    klines: DashMap<(String, String), VecDeque<Kline>>,
    on_ticker: RwLock<Option<TickerHandler>>,
    on_kline: RwLock<Option<KlineHandler>>,
}

/// Ticker and kline feed for one venue.
#[derive(Clone)]
pub struct PublicMarketStream {
    inner: Arc<StreamInner>,
}

impl PublicMarketStream {
    #[must_use]
    pub fn new(protocol: Arc<dyn MarketProtocol>, config: ConnectionConfig) -> Self {
        let config = config.with_ping_interval(protocol.ping_interval());
        Self {
            inner: Arc::new(StreamInner {
                protocol,
                config,
                connections: tokio::sync::Mutex::new(HashMap::new()),
                tickers: DashMap::new(),
                klines: DashMap::new(),
                on_ticker: RwLock::new(None),
                on_kline: RwLock::new(None),
            }),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.inner.protocol.platform()
    }

    pub fn set_on_ticker<F>(&self, handler: F)
    where
        F: Fn(&Ticker) + Send + Sync + 'static,
    {
        *self.inner.on_ticker.write() = Some(Arc::new(handler));
    }

    pub fn set_on_kline<F>(&self, handler: F)
    where
        F: Fn(&str, &str, &Kline) + Send + Sync + 'static,
    {
        *self.inner.on_kline.write() = Some(Arc::new(handler));
    }

    /// Subscribe to ticker and mark price updates for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be opened.
    pub async fn subscribe_ticker(&self, symbol: &str) -> Result<()> {
        let symbol = SymbolFormat::normalize(symbol);
        let subscriptions = self.inner.protocol.ticker_subscriptions(&symbol);
        let connection = self.connection(Channel::Ticker).await?;
        for sub in subscriptions {
            connection.subscribe(sub.key, sub.subscribe).await?;
        }
        info!(platform = %self.platform(), symbol = %symbol, "Subscribed to ticker");
        Ok(())
    }

    pub async fn unsubscribe_ticker(&self, symbol: &str) {
        let symbol = SymbolFormat::normalize(symbol);
        let subscriptions = self.inner.protocol.ticker_subscriptions(&symbol);
        self.release(Channel::Ticker, subscriptions).await;
        self.inner.tickers.remove(&symbol);
    }

    /// Subscribe to candles of `interval` (canonical, e.g. `1m`, `1h`).
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be opened.
    pub async fn subscribe_kline(&self, symbol: &str, interval: &str) -> Result<()> {
        let symbol = SymbolFormat::normalize(symbol);
        let sub = self.inner.protocol.kline_subscription(&symbol, interval);
        let connection = self.connection(Channel::Kline).await?;
        connection.subscribe(sub.key, sub.subscribe).await?;
        info!(platform = %self.platform(), symbol = %symbol, interval, "Subscribed to klines");
        Ok(())
    }

    pub async fn unsubscribe_kline(&self, symbol: &str, interval: &str) {
        let symbol = SymbolFormat::normalize(symbol);
        let sub = self.inner.protocol.kline_subscription(&symbol, interval);
        self.release(Channel::Kline, vec![sub]).await;
        self.inner.klines.remove(&(symbol, interval.to_string()));
    }

    /// Latest cached ticker.
    #[must_use]
    pub fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.inner
            .tickers
            .get(&SymbolFormat::normalize(symbol))
            .map(|t| t.clone())
    }

    /// Up to `limit` most recent cached klines, oldest first.
    #[must_use]
    pub fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Vec<Kline> {
        let key = (SymbolFormat::normalize(symbol), interval.to_string());
        self.inner.klines.get(&key).map_or_else(Vec::new, |bars| {
            let skip = bars.len().saturating_sub(limit);
            bars.iter().skip(skip).cloned().collect()
        })
    }

    /// Number of open endpoint connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    /// Disconnect every endpoint.
    pub async fn close(&self) {
        let connections: Vec<_> = self.inner.connections.lock().await.drain().collect();
        for (_, connection) in connections {
            connection.disconnect().await;
        }
    }

    /// Apply a decoded frame to the caches. Public so tests and replays can
    /// feed frames without a socket.
    pub fn apply(&self, message: MarketMessage) {
        Self::apply_inner(&self.inner, message);
    }

    // -- internals ----------------------------------------------------------

    async fn connection(&self, channel: Channel) -> Result<ConnectionManager> {
        let url = self.inner.protocol.endpoint(channel);
        let mut connections = self.inner.connections.lock().await;
        if let Some(existing) = connections.get(&url) {
            return Ok(existing.clone());
        }

        let name = format!("{}-public", self.platform());
        let connection = ConnectionManager::new(
            name,
            url.clone(),
            self.inner.config.clone(),
            self.inner.protocol.heartbeat(),
        );

        let weak = Arc::downgrade(&self.inner);
        connection.on_message(move |_, text| {
            if let Some(inner) = weak.upgrade() {
                for message in inner.protocol.decode(&text) {
                    Self::apply_inner(&inner, message);
                }
            }
        });
        let platform = self.platform();
        connection.on_terminal_failure(move |reason| {
            warn!(platform = %platform, reason, "Public market connection gave up");
        });

        connection.connect().await?;
        connections.insert(url, connection.clone());
        Ok(connection)
    }

    async fn release(&self, channel: Channel, subscriptions: Vec<Subscription>) {
        let url = self.inner.protocol.endpoint(channel);
        let mut connections = self.inner.connections.lock().await;
        let Some(connection) = connections.get(&url).cloned() else {
            return;
        };

        for sub in subscriptions {
            if connection.remove_subscription(&sub.key) && connection.is_connected() {
                if let Err(e) = connection.send(sub.unsubscribe).await {
                    debug!(key = %sub.key, error = %e, "Unsubscribe not delivered");
                }
            }
        }

        if connection.subscription_count() == 0 {
            connections.remove(&url);
            drop(connections);
            connection.disconnect().await;
        }
    }

    fn apply_inner(inner: &StreamInner, message: MarketMessage) {
        match message {
            MarketMessage::Ticker(update) => {
                let merged = {
                    let mut entry = inner
                        .tickers
                        .entry(update.symbol.clone())
                        .or_insert_with(|| Ticker::new(update.symbol.clone()));
                    let mark = entry.mark_price;
                    let index = entry.index_price;
                    *entry = update;
                    if entry.mark_price.is_zero() {
                        entry.mark_price = mark;
                    }
                    if entry.index_price.is_zero() {
                        entry.index_price = index;
                    }
                    entry.clone()
                };
                let handler = inner.on_ticker.read().clone();
                if let Some(handler) = handler {
                    handler(&merged);
                }
            }
            MarketMessage::MarkPrice {
                symbol,
                mark_price,
                index_price,
                timestamp,
            } => {
                let mut entry = inner
                    .tickers
                    .entry(symbol.clone())
                    .or_insert_with(|| Ticker::new(symbol));
                entry.mark_price = mark_price;
                if !index_price.is_zero() {
                    entry.index_price = index_price;
                }
                entry.timestamp = entry.timestamp.max(timestamp);
            }
            MarketMessage::Kline {
                symbol,
                interval,
                kline,
            } => {
                {
                    let mut bars = inner
                        .klines
                        .entry((symbol.clone(), interval.clone()))
                        .or_default();
                    insert_kline(&mut bars, kline.clone());
                }
                let handler = inner.on_kline.read().clone();
                if let Some(handler) = handler {
                    handler(&symbol, &interval, &kline);
                }
            }
        }
    }
}

/// Insert by open time, replacing a bar with the same open time and keeping
/// at most [`KLINE_CACHE_LIMIT`] bars.
fn insert_kline(bars: &mut VecDeque<Kline>, kline: Kline) {
    match bars.back() {
        Some(last) if last.open_time == kline.open_time => {
            if let Some(last) = bars.back_mut() {
                *last = kline;
            }
        }
        Some(last) if last.open_time > kline.open_time => {
            match bars.binary_search_by_key(&kline.open_time, |k| k.open_time) {
                Ok(pos) => bars[pos] = kline,
                Err(pos) => bars.insert(pos, kline),
            }
        }
        _ => bars.push_back(kline),
    }
    while bars.len() > KLINE_CACHE_LIMIT {
        bars.pop_front();
    }
}
