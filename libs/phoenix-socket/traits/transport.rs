//! Byte-level transport seam
//!
//! The socket never touches the network itself. It asks a [`Transport`] to
//! open a [`Connection`] and listens for what the connection reports
//! through the [`TransportSink`] it was handed.

use crate::core::connection_state::ConnectionState;
use crate::traits::error::Result;
use std::fmt;
use std::sync::Arc;

/// Normal closure; the socket does not reconnect after it
pub const CLOSE_NORMAL: u16 = 1000;
/// Protocol error closure; the socket does not reconnect after it
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Closure without a close frame (network failure, connect failure)
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Something a connection observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is ready to send
    Open,
    /// The connection is gone, with its close code
    Close(u16),
    /// A transport-level failure; the connection may still close afterwards
    Error(String),
    /// One inbound text frame
    Message(String),
}

/// Reporting handle given to a connection
///
/// Cloneable and cheap; every clone reports into the same socket.
#[derive(Clone)]
pub struct TransportSink {
    report: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl TransportSink {
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    pub fn report(&self, event: TransportEvent) {
        (self.report)(event)
    }

    pub fn open(&self) {
        self.report(TransportEvent::Open)
    }

    pub fn close(&self, code: u16) {
        self.report(TransportEvent::Close(code))
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(TransportEvent::Error(message.into()))
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(TransportEvent::Message(text.into()))
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink").finish_non_exhaustive()
    }
}

/// One live transport connection
///
/// Implementations must not block: `send` and `close` queue work for
/// whatever task drives the underlying stream.
pub trait Connection: Send + Sync {
    /// Queue one text frame
    fn send(&self, text: String) -> Result<()>;

    /// Request closure; the outcome is reported through the sink
    fn close(&self, code: Option<u16>, reason: Option<&str>);

    /// Current state as seen by the connection itself
    fn state(&self) -> ConnectionState;
}

/// Factory for connections
///
/// Implement this trait to run the socket over something other than the
/// default tokio-tungstenite WebSocket.
pub trait Transport: Send + Sync {
    /// Start connecting to `url`
    ///
    /// Must return immediately. Progress (open, frames, errors, close) is
    /// reported through `sink`. A failed connect is reported as an error
    /// followed by a close.
    fn connect(&self, url: &str, sink: TransportSink) -> Box<dyn Connection>;
}
