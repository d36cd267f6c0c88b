//! Common test utilities for phoenix-socket integration tests
//!
//! Two ways to drive a socket:
//!
//! - [`MockTransport`]: in-memory transport; tests open/close connections and
//!   inject frames by hand, and inspect what the socket sent
//! - [`PhoenixServer`]: a real WebSocket server on localhost that speaks just
//!   enough of the channel protocol for round trip tests

#![allow(dead_code)]

use parking_lot::Mutex;
use phoenix_socket::{
    AtomicConnectionState, Connection, ConnectionState, Message, Socket, Transport, TransportSink,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const ENDPOINT: &str = "ws://localhost:4000/socket";

#[derive(Default)]
struct MockState {
    urls: Vec<String>,
    sinks: Vec<TransportSink>,
    states: Vec<Arc<AtomicConnectionState>>,
    sent: Vec<String>,
    closes: Vec<(Option<u16>, Option<String>)>,
}

/// In-memory transport that records everything
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections opened so far
    pub fn connects(&self) -> usize {
        self.inner.lock().sinks.len()
    }

    pub fn last_url(&self) -> Option<String> {
        self.inner.lock().urls.last().cloned()
    }

    fn current(&self) -> (TransportSink, Arc<AtomicConnectionState>) {
        let inner = self.inner.lock();
        let sink = inner.sinks.last().cloned().expect("no connection yet");
        let state = inner.states.last().cloned().expect("no connection yet");
        (sink, state)
    }

    /// Sink of connection `index`, in connect order
    pub fn sink(&self, index: usize) -> TransportSink {
        self.inner.lock().sinks[index].clone()
    }

    /// Report the latest connection as open
    pub fn open(&self) {
        let (sink, state) = self.current();
        state.set(ConnectionState::Open);
        sink.open();
    }

    /// Report the latest connection as closed by the peer
    pub fn close(&self, code: u16) {
        let (sink, state) = self.current();
        state.set(ConnectionState::Closed);
        sink.close(code);
    }

    pub fn error(&self, message: &str) {
        let (sink, _) = self.current();
        sink.error(message);
    }

    /// Deliver one raw frame on the latest connection
    pub fn receive(&self, frame: impl Into<String>) {
        let (sink, _) = self.current();
        sink.message(frame);
    }

    /// Deliver one message on the latest connection
    pub fn receive_message(&self, message: &Message) {
        self.receive(message.encode().unwrap());
    }

    /// Raw frames sent so far
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    /// Decoded frames sent so far
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent()
            .iter()
            .map(|frame| Message::decode(frame).unwrap())
            .collect()
    }

    /// Decoded frames sent so far, clearing the record
    pub fn take_sent(&self) -> Vec<Message> {
        let sent = std::mem::take(&mut self.inner.lock().sent);
        sent.iter().map(|frame| Message::decode(frame).unwrap()).collect()
    }

    /// Last sent frame with `event`
    pub fn last_sent(&self, event: &str) -> Option<Message> {
        self.sent_messages().into_iter().rev().find(|m| m.event == event)
    }

    pub fn closes(&self) -> Vec<(Option<u16>, Option<String>)> {
        self.inner.lock().closes.clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, url: &str, sink: TransportSink) -> Box<dyn Connection> {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        let mut inner = self.inner.lock();
        inner.urls.push(url.to_string());
        inner.sinks.push(sink.clone());
        inner.states.push(Arc::clone(&state));
        Box::new(MockConnection {
            transport: self.clone(),
            sink,
            state,
        })
    }
}

struct MockConnection {
    transport: MockTransport,
    sink: TransportSink,
    state: Arc<AtomicConnectionState>,
}

impl Connection for MockConnection {
    fn send(&self, text: String) -> phoenix_socket::Result<()> {
        self.transport.inner.lock().sent.push(text);
        Ok(())
    }

    /// Closing completes immediately, like a peer that acks the close frame
    fn close(&self, code: Option<u16>, reason: Option<&str>) {
        self.transport
            .inner
            .lock()
            .closes
            .push((code, reason.map(str::to_string)));
        if !self.state.is_closed() {
            self.state.set(ConnectionState::Closed);
            self.sink.close(code.unwrap_or(phoenix_socket::CLOSE_NORMAL));
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

/// Let the socket's event loop drain everything queued so far
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock, then let timers and the event loop run
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

/// Socket over a fresh mock transport, not yet connected
pub fn mock_socket() -> (Socket, MockTransport) {
    let transport = MockTransport::new();
    let socket = Socket::builder()
        .endpoint(ENDPOINT)
        .transport(transport.clone())
        .build()
        .unwrap();
    (socket, transport)
}

/// Socket over a mock transport whose connection is already open
pub async fn connected_socket() -> (Socket, MockTransport) {
    let (socket, transport) = mock_socket();
    socket.connect();
    transport.open();
    settle().await;
    (socket, transport)
}

/// Reply frame answering `request`
pub fn reply(request: &Message, status: &str, response: Value) -> Message {
    Message::new(
        request.topic.clone(),
        "phx_reply",
        json!({ "status": status, "response": response }),
    )
    .with_refs(request.join_ref.clone(), request.reference.clone())
}

/// Answer the most recent `phx_join` with an ok reply
pub async fn ack_join(transport: &MockTransport) -> Message {
    let join = transport.last_sent("phx_join").expect("no join sent");
    transport.receive_message(&reply(&join, "ok", json!({})));
    settle().await;
    join
}

/// Thread-safe call recorder for callbacks
#[derive(Clone)]
pub struct Recorder<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, value: T) {
        self.calls.lock().push(value);
    }

    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Minimal Phoenix server on localhost
///
/// Replies ok to joins, leaves and heartbeats. A `shout` push is replied to
/// with ok and also broadcast back as a server push.
pub struct PhoenixServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl PhoenixServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
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

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message as WsFrame;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(WsFrame::Text(text))) => text,
                        Some(Ok(WsFrame::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    let Ok(request) = Message::decode(&text) else {
                        continue;
                    };

                    let mut outgoing = vec![reply(&request, "ok", json!({}))];
                    if request.event == "shout" {
                        outgoing.push(
                            Message::new(request.topic.clone(), "shout", request.payload.clone())
                                .with_refs(None, None),
                        );
                    }
                    for message in outgoing {
                        let frame = WsFrame::Text(message.encode().unwrap());
                        if write.send(frame).await.is_err() {
                            return;
                        }
                    }
                    if request.event == "phx_leave" {
                        let close = Message::new(request.topic.clone(), "phx_close", json!({}))
                            .with_refs(request.join_ref.clone(), None);
                        let _ = write.send(WsFrame::Text(close.encode().unwrap())).await;
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Endpoint URL for this server (without `/websocket`)
    pub fn endpoint(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for PhoenixServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
