pub mod states;

pub use states::{EndpointState, HasEndpoint, NoEndpoint};

use crate::core::config::SocketConfig;
use crate::core::socket::Socket;
use crate::traits::*;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`Socket`]
///
/// # Example
///
/// ```no_run
/// use phoenix_socket::{BackoffTable, Socket};
/// use std::time::Duration;
///
/// # async fn run() -> phoenix_socket::Result<()> {
/// let socket = Socket::builder()
///     .endpoint("wss://example.com/socket")
///     .param("token", "secret")
///     .timeout(Duration::from_secs(5))
///     .heartbeat_interval(Duration::from_secs(15))
///     .rejoin_after(BackoffTable::new(&[500, 1000], Duration::from_secs(5)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SocketBuilder<E: EndpointState> {
    _state: PhantomData<E>,
    config: SocketConfig,
}

impl SocketBuilder<NoEndpoint> {
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
            config: SocketConfig::new(String::new()),
        }
    }

    /// Endpoint URL without the `/websocket` suffix
    pub fn endpoint(self, endpoint: impl Into<String>) -> SocketBuilder<HasEndpoint> {
        let mut config = self.config;
        config.endpoint = endpoint.into();
        SocketBuilder {
            _state: PhantomData,
            config,
        }
    }
}

impl Default for SocketBuilder<NoEndpoint> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EndpointState> SocketBuilder<E> {
    /// Default timeout for joins, pushes and leaves
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Delay schedule between reconnect attempts
    pub fn reconnect_after<B>(mut self, backoff: B) -> Self
    where
        B: Backoff + 'static,
    {
        self.config.reconnect_after = Arc::new(backoff);
        self
    }

    /// Delay schedule between rejoin attempts of errored channels
    pub fn rejoin_after<B>(mut self, backoff: B) -> Self
    where
        B: Backoff + 'static,
    {
        self.config.rejoin_after = Arc::new(backoff);
        self
    }

    /// Append one query param to the connect URL
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.params.push((key.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn logger<L>(mut self, logger: L) -> Self
    where
        L: Logger + 'static,
    {
        self.config.logger = Some(Arc::new(logger));
        self
    }

    /// Replace the default WebSocket transport
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.config.transport = Arc::new(transport);
        self
    }
}

impl SocketBuilder<HasEndpoint> {
    /// Finish without creating a socket
    pub fn config(self) -> SocketConfig {
        self.config
    }

    /// Create the socket; must be called inside a Tokio runtime
    ///
    /// The socket does not connect until [`Socket::connect`] is called.
    pub fn build(self) -> Result<Socket> {
        Socket::new(self.config)
    }
}
