//! # Channel engine
//!
//! - **socket**: owns the connection, the channel registry and the event loop
//! - **channel**: per-topic join/leave state machine and event bindings
//! - **push**: one request with its ref, timeout and reply callbacks
//! - **timer**: resettable timers feeding the event loop
//! - **binding**: ordered event name to callback registry
//! - **message**: frame model and codec
//! - **websocket**: default tokio-tungstenite transport

pub mod binding;
pub mod builder;
pub mod channel;
pub mod config;
pub mod connection_state;
pub mod message;
pub mod push;
pub mod socket;
pub mod timer;
pub mod websocket;

// Re-export main types
pub use binding::{BindingRef, Bindings, Callback, Projection};
pub use builder::{states, SocketBuilder};
pub use channel::{Channel, ChannelState};
pub use config::SocketConfig;
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use message::{Message, ReplyStatus};
pub use push::Push;
pub use socket::{Socket, SocketEvent, SOCKET_EVENT_CAPACITY};
pub use timer::{Interval, Timer, TimerTick};
pub use websocket::WebSocketTransport;

/// Create a new socket builder
///
/// Convenience for [`Socket::builder`].
pub fn builder() -> SocketBuilder<builder::states::NoEndpoint> {
    SocketBuilder::new()
}
