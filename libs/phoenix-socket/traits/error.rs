use thiserror::Error;

/// Main error type for phoenix-socket
///
/// Only caller misuse and codec/transport plumbing failures are reported
/// through this type. Reply errors, timeouts and disconnects are delivered
/// through push and channel bindings instead.
#[derive(Error, Debug)]
pub enum PhoenixError {
    /// `join()` was called a second time on the same channel
    #[error("Tried to join {topic} multiple times")]
    AlreadyJoined { topic: String },

    /// `push()` was called before the channel was ever joined
    #[error(
        "Tried to push {event} to {topic} before joining. \
         Use Channel::join() before pushing events"
    )]
    PushBeforeJoin { topic: String, event: String },

    /// The channel already reached Closed and was dropped by its socket
    #[error("Channel {0} is closed")]
    ChannelClosed(String),

    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound frame could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal event queue is gone
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl From<serde_json::Error> for PhoenixError {
    fn from(err: serde_json::Error) -> Self {
        PhoenixError::Decode(err.to_string())
    }
}

/// Result type for phoenix-socket operations
pub type Result<T> = std::result::Result<T, PhoenixError>;
