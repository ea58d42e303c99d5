//! Reconnecting WebSocket connection.
//!
//! [`ConnectionManager`] owns one logical streaming connection and keeps it
//! alive:
//!
//! - a read task pushes inbound text frames into a bounded queue that drops
//!   the oldest entry when full
//! - a heartbeat task sends the venue's ping and declares the socket dead
//!   when nothing arrives within the pong timeout
//! - a single dispatch task drains the queue into the message handler, so
//!   slow handlers never stall the socket
//! - every outbound write goes through one async mutex
//!
//! When the socket fails the supervisor moves to
//! [`ConnectionState::Reconnecting`], retries with exponential backoff and,
//! once reconnected, replays every saved subscription before firing the
//! connected handler. After `max_reconnects` failed attempts it gives up,
//! moves to [`ConnectionState::Disconnected`] and fires the terminal handler.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Lifecycle of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Keep-alive payload sent every ping interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heartbeat {
    /// WebSocket protocol ping frame.
    Ping,
    /// Application-level text frame, e.g. `"ping"`.
    Text(String),
}

/// Called on every inbound text frame, from the dispatch task.
pub type MessageHandler = Arc<dyn Fn(&ConnectionManager, String) + Send + Sync>;
/// Called after (re)connecting and replaying subscriptions.
pub type ConnectedHandler = Arc<dyn Fn(&ConnectionManager) + Send + Sync>;
/// Called with a reason when the socket drops or reconnection gives up.
pub type ReasonHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default, Clone)]
struct Handlers {
    message: Option<MessageHandler>,
    connected: Option<ConnectedHandler>,
    disconnected: Option<ReasonHandler>,
    terminal: Option<ReasonHandler>,
}

// ---------------------------------------------------------------------------
// Inbound queue
// ---------------------------------------------------------------------------

/// Bounded FIFO that evicts the oldest message on overflow.
struct InboundQueue {
    capacity: usize,
    items: Mutex<VecDeque<String>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl InboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, message: String) {
        {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                items.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(dropped, "Inbound queue full, dropping oldest messages");
                }
            }
            items.push_back(message);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<String> {
        self.items.lock().pop_front()
    }

    fn clear(&self) {
        self.items.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// Connection manager
// ---------------------------------------------------------------------------

struct Inner {
    name: String,
    url: RwLock<String>,
    config: ConnectionConfig,
    heartbeat: Heartbeat,
    state: RwLock<ConnectionState>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    subscriptions: Mutex<HashMap<String, String>>,
    handlers: RwLock<Handlers>,
    queue: InboundQueue,
    /// Set when a ping goes out, cleared by any inbound frame.
    awaiting_pong: Mutex<Option<Instant>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Reconnecting WebSocket with heartbeat and subscription replay.
///
/// Cloning is cheap and yields another handle to the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in logs
    /// * `url` - WebSocket URL
    /// * `config` - Heartbeat, backoff and buffer settings
    /// * `heartbeat` - Keep-alive payload for this venue
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        config: ConnectionConfig,
        heartbeat: Heartbeat,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let buffer = config.buffer_size;
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                url: RwLock::new(url.into()),
                config,
                heartbeat,
                state: RwLock::new(ConnectionState::Disconnected),
                writer: tokio::sync::Mutex::new(None),
                subscriptions: Mutex::new(HashMap::new()),
                handlers: RwLock::new(Handlers::default()),
                queue: InboundQueue::new(buffer),
                awaiting_pong: Mutex::new(None),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&ConnectionManager, String) + Send + Sync + 'static,
    {
        self.inner.handlers.write().message = Some(Arc::new(handler));
    }

    pub fn on_connected<F>(&self, handler: F)
    where
        F: Fn(&ConnectionManager) + Send + Sync + 'static,
    {
        self.inner.handlers.write().connected = Some(Arc::new(handler));
    }

    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.handlers.write().disconnected = Some(Arc::new(handler));
    }

    /// Handler for the final give-up after exhausting reconnect attempts.
    pub fn on_terminal_failure<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.handlers.write().terminal = Some(Arc::new(handler));
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.inner.url.read().clone()
    }

    /// Change the URL used by the next (re)connect.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.inner.url.write() = url.into();
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Messages evicted from the inbound queue so far.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.inner.queue.dropped.load(Ordering::Relaxed)
    }

    /// Open the socket and start the read, heartbeat and dispatch tasks.
    ///
    /// Calling this while already connected or reconnecting is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection attempt fails; no background
    /// task is left running in that case.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write();
            if *state != ConnectionState::Disconnected {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }
        self.inner.shutdown.send_replace(false);
        self.inner.tasks.lock().retain(|task| !task.is_finished());

        let source = match self.open().await {
            Ok(source) => source,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.set_state(ConnectionState::Connected);
        info!(connection = %self.inner.name, "Connected");
        self.replay_subscriptions().await;
        self.fire_connected();

        let dispatch = tokio::spawn(Self::dispatch_loop(self.clone()));
        let supervisor = tokio::spawn(Self::supervise(self.clone(), source));
        self.inner.tasks.lock().extend([dispatch, supervisor]);
        Ok(())
    }

    /// Close the socket and stop every background task.
    pub async fn disconnect(&self) {
        self.inner.shutdown.send_replace(true);
        self.set_state(ConnectionState::Disconnected);

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(connection = %self.inner.name, error = %e, "Close frame not delivered");
            }
        }

        let tasks: Vec<_> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            let abort = task.abort_handle();
            if timeout(Duration::from_secs(2), task).await.is_err() {
                debug!(connection = %self.inner.name, "Background task did not stop in time, aborting");
                abort.abort();
            }
        }
        self.inner.queue.clear();
        info!(connection = %self.inner.name, "Disconnected");
    }

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a live socket, or the write
    /// error.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.send_message(Message::Text(text.into())).await
    }

    async fn send_message(&self, message: Message) -> Result<()> {
        let mut writer = self.inner.writer.lock().await;
        let sink = writer.as_mut().ok_or(Error::NotConnected)?;
        sink.send(message).await?;
        Ok(())
    }

    /// Remember a subscribe frame so it is replayed after every reconnect.
    pub fn save_subscription(&self, key: impl Into<String>, message: impl Into<String>) {
        self.inner
            .subscriptions
            .lock()
            .insert(key.into(), message.into());
    }

    pub fn remove_subscription(&self, key: &str) -> bool {
        self.inner.subscriptions.lock().remove(key).is_some()
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Save `message` under `key` and send it now when connected.
    ///
    /// # Errors
    ///
    /// Returns the write error; the subscription stays saved and is sent on
    /// the next reconnect.
    pub async fn subscribe(&self, key: impl Into<String>, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.save_subscription(key, message.clone());
        if self.is_connected() {
            self.send(message).await?;
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write() = state;
    }

    fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    async fn open(&self) -> Result<WsSource> {
        let url = self.url();
        debug!(connection = %self.inner.name, url = %url, "Opening WebSocket");

        let connect_timeout = Duration::from_millis(self.inner.config.connect_timeout_ms);
        let (stream, _) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::Connection(format!("connect timeout after {connect_timeout:?}")))??;

        let (sink, source) = stream.split();
        *self.inner.writer.lock().await = Some(sink);
        *self.inner.awaiting_pong.lock() = None;
        Ok(source)
    }

    async fn replay_subscriptions(&self) {
        let saved: Vec<(String, String)> = self
            .inner
            .subscriptions
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if saved.is_empty() {
            return;
        }
        debug!(connection = %self.inner.name, count = saved.len(), "Replaying subscriptions");
        for (key, message) in saved {
            if let Err(e) = self.send(message).await {
                warn!(connection = %self.inner.name, key = %key, error = %e, "Subscription replay failed");
            }
        }
    }

    fn fire_connected(&self) {
        let handler = self.inner.handlers.read().connected.clone();
        if let Some(handler) = handler {
            handler(self);
        }
    }

    fn fire_reason(&self, terminal: bool, reason: &str) {
        let handlers = self.inner.handlers.read().clone();
        let handler = if terminal {
            handlers.terminal
        } else {
            handlers.disconnected
        };
        if let Some(handler) = handler {
            handler(reason);
        }
    }

    /// Reconnect delay for attempt `n` (1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        let millis = self
            .inner
            .config
            .reconnect_delay_ms
            .saturating_mul(1 << exponent)
            .min(self.inner.config.max_reconnect_delay_ms);
        Duration::from_millis(millis)
    }

    /// Owns the socket lifecycle until shutdown or terminal failure.
    async fn supervise(self, mut source: WsSource) {
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            let reason = match self.run_session(source, &mut shutdown).await {
                Some(reason) => reason,
                None => return,
            };

            self.set_state(ConnectionState::Reconnecting);
            self.inner.writer.lock().await.take();
            warn!(connection = %self.inner.name, reason = %reason, "Connection lost, reconnecting");
            self.fire_reason(false, &reason);

            source = match self.reconnect(&mut shutdown).await {
                Some(source) => source,
                None => return,
            };
        }
    }

    /// Run read and heartbeat tasks until one fails. `None` means shutdown.
    async fn run_session(
        &self,
        source: WsSource,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<String> {
        let (fail_tx, mut fail_rx) = mpsc::channel::<String>(2);
        let reader = tokio::spawn(Self::read_loop(self.clone(), source, fail_tx.clone()));
        let heartbeat = tokio::spawn(Self::heartbeat_loop(self.clone(), fail_tx));

        let reason = tokio::select! {
            reason = fail_rx.recv() => Some(reason.unwrap_or_else(|| "session ended".into())),
            _ = shutdown.changed() => None,
        };

        reader.abort();
        heartbeat.abort();

        if self.is_shutting_down() {
            None
        } else {
            reason
        }
    }

    /// Backoff loop. `None` means shutdown or terminal failure.
    async fn reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> Option<WsSource> {
        let max_attempts = self.inner.config.max_reconnects;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > max_attempts {
                error!(
                    connection = %self.inner.name,
                    attempts = max_attempts,
                    "Reconnect attempts exhausted, giving up"
                );
                self.set_state(ConnectionState::Disconnected);
                self.inner.shutdown.send_replace(true);
                self.fire_reason(true, "max reconnect attempts exceeded");
                return None;
            }

            let delay = self.backoff(attempt);
            info!(
                connection = %self.inner.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after delay"
            );
            tokio::select! {
                () = sleep(delay) => {}
                _ = shutdown.changed() => return None,
            }
            if self.is_shutting_down() {
                return None;
            }

            match self.open().await {
                Ok(source) => {
                    if self.is_shutting_down() {
                        return None;
                    }
                    self.set_state(ConnectionState::Connected);
                    info!(connection = %self.inner.name, attempt, "Reconnected");
                    self.replay_subscriptions().await;
                    self.fire_connected();
                    return Some(source);
                }
                Err(e) => {
                    warn!(connection = %self.inner.name, attempt, error = %e, "Reconnect failed");
                }
            }
        }
    }

    async fn read_loop(self, mut source: WsSource, fail: mpsc::Sender<String>) {
        let reason = loop {
            let Some(frame) = source.next().await else {
                break "stream ended".to_string();
            };
            *self.inner.awaiting_pong.lock() = None;

            match frame {
                Ok(Message::Text(text)) => {
                    trace!(connection = %self.inner.name, bytes = text.len(), "Received text frame");
                    self.inner.queue.push(text);
                }
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => self.inner.queue.push(text),
                    Err(_) => debug!(connection = %self.inner.name, "Ignoring non-UTF-8 binary frame"),
                },
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.send_message(Message::Pong(payload)).await {
                        break format!("pong write failed: {e}");
                    }
                }
                Ok(Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    break frame.map_or_else(
                        || "closed by server".to_string(),
                        |f| format!("closed by server: {} {}", f.code, f.reason),
                    );
                }
                Err(e) => break format!("read error: {e}"),
            }
        };
        let _ = fail.send(reason).await;
    }

    async fn heartbeat_loop(self, fail: mpsc::Sender<String>) {
        let interval = Duration::from_millis(self.inner.config.ping_interval_ms.max(1));
        let pong_timeout = Duration::from_millis(self.inner.config.pong_timeout_ms);
        let mut next_ping = Instant::now() + interval;

        let reason = loop {
            let pending = *self.inner.awaiting_pong.lock();
            let deadline = pending.map(|sent_at| sent_at + pong_timeout);
            if let Some(deadline) = deadline.filter(|d| *d < next_ping) {
                sleep_until(deadline).await;
                if self.pong_overdue(pong_timeout) {
                    break "pong timeout".to_string();
                }
                continue;
            }

            sleep_until(next_ping).await;
            next_ping += interval;
            if self.pong_overdue(pong_timeout) {
                break "pong timeout".to_string();
            }

            let message = match &self.inner.heartbeat {
                Heartbeat::Ping => Message::Ping(Vec::new()),
                Heartbeat::Text(text) => Message::Text(text.clone()),
            };
            if let Err(e) = self.send_message(message).await {
                break format!("heartbeat write failed: {e}");
            }
            self.inner.awaiting_pong.lock().get_or_insert_with(Instant::now);
        };
        let _ = fail.send(reason).await;
    }

    fn pong_overdue(&self, pong_timeout: Duration) -> bool {
        self.inner
            .awaiting_pong
            .lock()
            .is_some_and(|sent_at| sent_at.elapsed() >= pong_timeout)
    }

    async fn dispatch_loop(self) {
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            while let Some(message) = self.inner.queue.pop() {
                let handler = self.inner.handlers.read().message.clone();
                if let Some(handler) = handler {
                    handler(&self, message);
                }
            }
            tokio::select! {
                () = self.inner.queue.notify.notified() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
