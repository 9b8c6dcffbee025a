//! Common test utilities for livelink integration tests
//!
//! - `MockConnector` / `MockPeer`: in-memory transport driven from the test,
//!   usable under a paused tokio clock
//! - `MockWsServer`: a real tungstenite server on localhost

#![allow(dead_code)]

use async_trait::async_trait;
use crossbeam_channel::Receiver;
use livelink::{
    builder, states::WithEndpoint, Connector, LinkClientBuilder, LinkError, LinkEvent, Result,
    Transport, WsMessage,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const MOCK_URL: &str = "ws://mock.local/link";

/// Builder pointed at the mock with a static credential
pub fn mock_client(connector: &MockConnector) -> LinkClientBuilder<WithEndpoint> {
    builder()
        .url(MOCK_URL)
        .credential("tok")
        .connector(connector.clone())
}

/// Let the manager task drain its inbox
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Poll a channel until `pred` matches or `timeout` elapses
pub async fn wait_for<F>(rx: &Receiver<LinkEvent>, timeout: Duration, pred: F) -> Option<LinkEvent>
where
    F: Fn(&LinkEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        while let Ok(event) = rx.try_recv() {
            if pred(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

pub fn drain(rx: &Receiver<LinkEvent>) -> Vec<LinkEvent> {
    rx.try_iter().collect()
}

/// What the next handshake does
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Script {
    Accept,
    Refuse,
    /// Never completes; exercises the connection timeout
    Hang,
}

struct ConnectorInner {
    script: Mutex<VecDeque<Script>>,
    fallback: Mutex<Script>,
    attempts: AtomicUsize,
    tokens: Mutex<Vec<String>>,
    peers: Mutex<VecDeque<MockPeer>>,
}

/// In-memory connector; clones share one script and log
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<ConnectorInner>,
}

impl MockConnector {
    /// Every handshake behaves as `fallback` unless scripted otherwise
    pub fn new(fallback: Script) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(fallback),
                attempts: AtomicUsize::new(0),
                tokens: Mutex::new(Vec::new()),
                peers: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Script::Accept)
    }

    pub fn refusing() -> Self {
        Self::new(Script::Refuse)
    }

    /// Queue one-off behaviours ahead of the fallback
    pub fn script(self, steps: &[Script]) -> Self {
        self.inner.script.lock().extend(steps.iter().copied());
        self
    }

    pub fn set_fallback(&self, script: Script) {
        *self.inner.fallback.lock() = script;
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.inner.tokens.lock().clone()
    }

    /// Server side of the oldest accepted connection not yet taken
    pub fn next_peer(&self) -> Option<MockPeer> {
        self.inner.peers.lock().pop_front()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn Transport>> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.tokens.lock().push(token.to_string());

        let step = self
            .inner
            .script
            .lock()
            .pop_front()
            .unwrap_or(*self.inner.fallback.lock());
        verbose_println!("  mock handshake #{} to {}: {:?}", attempt, url, step);

        match step {
            Script::Accept => {
                let (transport, peer) = MockTransport::pair();
                self.inner.peers.lock().push_back(peer);
                Ok(Box::new(transport))
            }
            Script::Refuse => Err(LinkError::ConnectionFailed("connection refused".into())),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Client half of an in-memory connection
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<WsMessage>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    hang_writes: Arc<AtomicBool>,
}

impl MockTransport {
    fn pair() -> (Self, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let fail_writes = Arc::new(AtomicBool::new(false));
        let hang_writes = Arc::new(AtomicBool::new(false));

        let transport = Self {
            inbound: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            fail_writes: Arc::clone(&fail_writes),
            hang_writes: Arc::clone(&hang_writes),
        };
        let peer = MockPeer {
            inbound: Arc::new(Mutex::new(Some(tx))),
            sent,
            closed,
            fail_writes,
            hang_writes,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: WsMessage) -> Result<()> {
        if self.hang_writes.load(Ordering::SeqCst) {
            // A peer that stopped reading: the socket buffer never drains
            std::future::pending::<()>().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::ConnectionFailed("broken pipe".into()));
        }
        if let WsMessage::Text(text) = frame {
            self.sent.lock().push(text);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inbound.close();
    }
}

/// Server half of an in-memory connection
#[derive(Clone)]
pub struct MockPeer {
    inbound: Arc<Mutex<Option<mpsc::UnboundedSender<WsMessage>>>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    hang_writes: Arc<AtomicBool>,
}

impl MockPeer {
    /// Deliver one text frame to the client
    pub fn push(&self, text: &str) {
        if let Some(tx) = self.inbound.lock().as_ref() {
            let _ = tx.send(WsMessage::Text(text.to_string()));
        }
    }

    pub fn push_json(&self, value: Value) {
        self.push(&value.to_string());
    }

    pub fn pong(&self) {
        self.push(r#"{"type":"pong","payload":{}}"#);
    }

    /// Simulate the server going away
    pub fn drop_connection(&self) {
        self.inbound.lock().take();
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Every later client write blocks forever
    pub fn hang_writes(&self) {
        self.hang_writes.store(true, Ordering::SeqCst);
    }

    /// Raw frames the client wrote
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Frames the client wrote, parsed
    pub fn sent_messages(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// Parsed frames of one `type`
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent_messages()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    /// Whether the client closed its side
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A small WebSocket server speaking the link envelope
///
/// Records the `Authorization` header of every handshake, answers `ping`
/// with `pong` and echoes every other text frame.
pub struct MockWsServer {
    pub addr: SocketAddr,
    authorizations: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let authorizations = Arc::new(Mutex::new(Vec::new()));

        let shutdown_clone = Arc::clone(&shutdown);
        let auth_log = Arc::clone(&authorizations);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = Arc::clone(&shutdown_clone);
                                let auth_log = Arc::clone(&auth_log);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, auth_log, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            authorizations,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        auth_log: Arc<Mutex<Vec<String>>>,
        shutdown: Arc<Notify>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::Message;

        type Handshake = std::result::Result<Response, ErrorResponse>;

        let record = move |req: &Request, resp: Response| -> Handshake {
            let value = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            auth_log.lock().push(value);
            Ok(resp)
        };

        let ws_stream = match accept_hdr_async(stream, record).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let kind = serde_json::from_str::<Value>(&text)
                                .ok()
                                .and_then(|v| v["type"].as_str().map(str::to_string));
                            let reply = if kind.as_deref() == Some("ping") {
                                r#"{"type":"pong","payload":{}}"#.to_string()
                            } else {
                                text
                            };
                            if write.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// `Authorization` header value of every handshake so far
    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
