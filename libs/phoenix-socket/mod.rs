//! # Phoenix Socket
//!
//! Client for Phoenix-style multiplexed channels over one WebSocket.
//!
//! ## Features
//!
//! - **Multiplexing**: any number of topic channels over one connection
//! - **Reply correlation**: every push resolves exactly once, with ok, error or timeout
//! - **Resilience**: heartbeats, reconnect and rejoin with configurable backoff
//! - **Buffering**: frames and pushes issued while offline are sent once possible
//! - **Pluggable transport**: tokio-tungstenite by default, any [`Transport`] otherwise
//!
//! ## Example
//!
//! ```no_run
//! use phoenix_socket::Socket;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> phoenix_socket::Result<()> {
//!     let socket = Socket::builder()
//!         .endpoint("ws://localhost:4000/socket")
//!         .build()?;
//!     socket.connect();
//!
//!     let channel = socket.channel("room:lobby");
//!     channel.on("new_msg", |payload| println!("new_msg: {payload}"))?;
//!     channel.join()?.receive_ok(|_| println!("joined"));
//!
//!     channel
//!         .push("new_msg", json!({"body": "hello"}))?
//!         .receive_ok(|response| println!("ack: {response}"))
//!         .receive_timeout(|| println!("no reply"));
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export the channel engine
pub use core::{
    binding, builder, channel, config, connection_state, message, push, socket, timer, websocket,
    AtomicConnectionState, BindingRef, Callback, Channel, ChannelState, ConnectionState, Message,
    Push, ReplyStatus, Socket, SocketBuilder, SocketConfig, SocketEvent, WebSocketTransport,
    SOCKET_EVENT_CAPACITY,
};

// Convenience function
pub use core::builder as socket_builder;
