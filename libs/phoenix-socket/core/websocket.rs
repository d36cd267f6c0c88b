//! Default transport over tokio-tungstenite
//!
//! Each connection runs on its own Tokio task. The handle returned to the
//! socket only queues commands for that task; everything the task observes
//! is reported back through the [`TransportSink`].

use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Close frame received without a status code
const CLOSE_NO_STATUS: u16 = 1005;

/// Internal command messages for a connection task
#[derive(Debug)]
enum Command {
    /// Send one text frame
    Send(String),
    /// Send a close frame and stop
    Close(Option<u16>, Option<String>),
}

/// WebSocket transport used by default
///
/// `connect` spawns onto the current Tokio runtime, so it must be called
/// from within one (the socket takes care of that).
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, url: &str, sink: TransportSink) -> Box<dyn Connection> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));

        tokio::spawn(run_connection(
            url.to_string(),
            Arc::clone(&state),
            command_rx,
            sink,
        ));

        Box::new(WebSocketConnection {
            command_tx,
            state,
        })
    }
}

/// Handle to one running WebSocket connection task
///
/// Dropping the handle closes the connection.
struct WebSocketConnection {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicConnectionState>,
}

impl Connection for WebSocketConnection {
    fn send(&self, text: String) -> Result<()> {
        if !self.state.is_open() {
            return Err(PhoenixError::ConnectionClosed(format!(
                "cannot send while {}",
                self.state.get()
            )));
        }
        self.command_tx
            .send(Command::Send(text))
            .map_err(|e| PhoenixError::ChannelSend(e.to_string()))
    }

    fn close(&self, code: Option<u16>, reason: Option<&str>) {
        if self.state.is_closed() {
            return;
        }
        self.state.set(ConnectionState::Closing);
        let _ = self
            .command_tx
            .send(Command::Close(code, reason.map(str::to_string)));
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

/// Wait until the handle asks to close or goes away
async fn closed(commands: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Close(..)) | None => return,
            Some(Command::Send(_)) => warn!("Dropping frame queued before the connection opened"),
        }
    }
}

/// Main task for one connection: connect, then pump frames both ways
async fn run_connection(
    url: String,
    state: Arc<AtomicConnectionState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    sink: TransportSink,
) {
    debug!("Connecting to {}", url);

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = closed(&mut commands) => {
            debug!("Connection to {} abandoned before it opened", url);
            state.set(ConnectionState::Closed);
            sink.close(CLOSE_NORMAL);
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            state.set(ConnectionState::Closed);
            sink.error(e.to_string());
            sink.close(CLOSE_ABNORMAL);
            return;
        }
    };

    info!("Connected to {}", url);
    state.set(ConnectionState::Open);
    sink.open();

    let (mut write, mut read) = ws_stream.split();

    let code = loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => sink.message(text),
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_NO_STATUS);
                        debug!(code, "Server closed the connection");
                        break code;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(len = data.len(), "Ignoring binary frame");
                    }
                    // Ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        sink.error(e.to_string());
                        break CLOSE_ABNORMAL;
                    }
                    None => {
                        warn!("WebSocket stream ended without a close frame");
                        break CLOSE_ABNORMAL;
                    }
                }
            }

            command = commands.recv() => {
                match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!("Failed to send frame: {}", e);
                            sink.error(e.to_string());
                            break CLOSE_ABNORMAL;
                        }
                    }
                    Some(Command::Close(code, reason)) => {
                        let code = code.unwrap_or(CLOSE_NORMAL);
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.unwrap_or_default().into(),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            debug!("Close frame not delivered: {}", e);
                        }
                        break code;
                    }
                    None => {
                        debug!("Connection handle dropped, closing");
                        let _ = write.close().await;
                        break CLOSE_NORMAL;
                    }
                }
            }
        }
    };

    state.set(ConnectionState::Closed);
    info!(code, "Disconnected from {}", url);
    sink.close(code);
}
