//! # Phoenix Socket Traits
//!
//! Seams between the channel engine and its collaborators:
//!
//! - **Transport / Connection**: open a connection, send and receive text frames
//! - **Backoff**: map a try count to a delay (reconnects and rejoins)
//! - **Logger**: optional sink for the protocol trace
//! - **PhoenixError**: caller misuse and plumbing failures

pub mod backoff;
pub mod error;
pub mod logger;
pub mod transport;

// Re-export commonly used types
pub use backoff::{Backoff, BackoffTable, ExponentialBackoff, FixedDelay};
pub use error::{PhoenixError, Result};
pub use logger::Logger;
pub use transport::{
    Connection, Transport, TransportEvent, TransportSink, CLOSE_ABNORMAL, CLOSE_NORMAL,
    CLOSE_PROTOCOL_ERROR,
};
