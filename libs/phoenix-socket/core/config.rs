use crate::core::websocket::WebSocketTransport;
use crate::traits::*;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::form_urlencoded;

/// Protocol version appended to every connect URL
pub const PROTOCOL_VERSION: &str = "2.0.0";

/// Default push and join timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for a [`Socket`](crate::Socket)
///
/// Built with [`SocketBuilder`](crate::SocketBuilder); every field except the
/// endpoint has a default.
pub struct SocketConfig {
    /// Endpoint URL without the `/websocket` suffix (`ws://host/socket`)
    pub(crate) endpoint: String,

    /// Query params appended to the connect URL, in insertion order
    pub(crate) params: Vec<(String, String)>,

    /// Default timeout for joins, pushes and leaves
    pub(crate) timeout: Duration,

    /// Period of the heartbeat; an unanswered heartbeat closes the connection
    pub(crate) heartbeat_interval: Duration,

    /// Delay before reconnect attempt `n`
    pub(crate) reconnect_after: Arc<dyn Backoff>,

    /// Delay before rejoin attempt `n`
    pub(crate) rejoin_after: Arc<dyn Backoff>,

    /// Optional extra consumer of the protocol trace
    pub(crate) logger: Option<Arc<dyn Logger>>,

    /// Connection factory
    pub(crate) transport: Arc<dyn Transport>,
}

impl SocketConfig {
    /// Defaults for everything but the endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_after: Arc::new(BackoffTable::reconnect()),
            rejoin_after: Arc::new(BackoffTable::rejoin()),
            logger: None,
            transport: Arc::new(WebSocketTransport::new()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    /// `endpoint + "/websocket?vsn=2.0.0"` followed by `&key=value` per param
    pub fn endpoint_url(&self) -> String {
        let mut url = format!(
            "{}/websocket?vsn={}",
            self.endpoint.trim_end_matches('/'),
            PROTOCOL_VERSION
        );
        for (key, value) in &self.params {
            url.push('&');
            url.extend(form_urlencoded::byte_serialize(key.as_bytes()));
            url.push('=');
            url.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        }
        url
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(PhoenixError::Configuration("endpoint must not be empty".to_string()));
        }
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(PhoenixError::Configuration(format!(
                "endpoint must use ws:// or wss://, got {}",
                self.endpoint
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(PhoenixError::Configuration(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SocketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketConfig")
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("has_logger", &self.has_logger())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_without_params() {
        let config = SocketConfig::new("ws://localhost:4000/socket");
        assert_eq!(
            config.endpoint_url(),
            "ws://localhost:4000/socket/websocket?vsn=2.0.0"
        );
    }

    #[test]
    fn test_endpoint_url_encodes_params_in_order() {
        let mut config = SocketConfig::new("wss://example.com/socket/");
        config.params.push(("token".into(), "a b&c".into()));
        config.params.push(("user_id".into(), "42".into()));
        assert_eq!(
            config.endpoint_url(),
            "wss://example.com/socket/websocket?vsn=2.0.0&token=a+b%26c&user_id=42"
        );
    }

    #[test]
    fn test_defaults() {
        let config = SocketConfig::new("ws://localhost/socket");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.reconnect_after.delay(1), Duration::from_millis(10));
        assert_eq!(config.rejoin_after.delay(3), Duration::from_millis(5000));
        assert!(!config.has_logger());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        assert!(SocketConfig::new("").validate().is_err());
        assert!(SocketConfig::new("http://localhost/socket").validate().is_err());

        let mut config = SocketConfig::new("ws://localhost/socket");
        config.heartbeat_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
