//! Local WebSocket server for exercising reconnects and subscriptions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Maps an inbound text frame to an optional reply on the same socket.
pub type Responder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct Client {
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<String>>,
    clients: Mutex<Vec<Client>>,
    accepted: AtomicUsize,
    responder: RwLock<Option<Responder>>,
}

/// WebSocket server on an ephemeral local port.
///
/// Text frames from clients are recorded; [`MockWsServer::drop_clients`]
/// kills every open socket so reconnect logic can be observed.
pub struct MockWsServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept: JoinHandle<()>,
}

impl MockWsServer {
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared::default());

        let state = Arc::clone(&shared);
        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_client(socket, &state).await;
            }
        });

        Ok(Self {
            addr,
            shared,
            accept,
        })
    }

    /// `ws://127.0.0.1:<port>`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Reply to matching frames, e.g. `"ping"` with `"pong"` or a login with
    /// its acknowledgement.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        *self.shared.responder.write() = Some(Arc::new(responder));
    }

    /// Handshakes completed since start.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Every text frame received, across all connections.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.shared.received.lock().clone()
    }

    pub fn clear_received(&self) {
        self.shared.received.lock().clear();
    }

    /// Push a text frame to every open connection.
    pub fn broadcast(&self, text: impl Into<String>) {
        let text = text.into();
        let mut clients = self.shared.clients.lock();
        clients.retain(|c| c.outbound.send(Message::Text(text.clone())).is_ok());
    }

    /// Abort every open connection without a close handshake.
    pub fn drop_clients(&self) {
        for client in self.shared.clients.lock().drain(..) {
            client.task.abort();
        }
    }

    /// Poll until `predicate` holds for the received frames or `wait` elapses.
    pub async fn wait_for<F>(&self, wait: Duration, predicate: F) -> bool
    where
        F: Fn(&[String]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if predicate(&self.received()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until at least `count` handshakes completed.
    pub async fn wait_for_accepted(&self, count: usize, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        while self.accepted() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.accept.abort();
        self.drop_clients();
    }
}

async fn accept_client(socket: TcpStream, shared: &Arc<Shared>) {
    let Ok(ws) = accept_async(socket).await else {
        return;
    };
    shared.accepted.fetch_add(1, Ordering::SeqCst);

    let (outbound, mut rx) = mpsc::unbounded_channel::<Message>();
    let state = Arc::clone(shared);
    let task = tokio::spawn(async move {
        let (mut sink, mut source) = ws.split();
        loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    let Some(message) = outgoing else { break };
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.received.lock().push(text.clone());
                        let responder = state.responder.read().clone();
                        if let Some(reply) = responder.and_then(|r| r(&text)) {
                            if sink.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    shared.clients.lock().push(Client { outbound, task });
}
