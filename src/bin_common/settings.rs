//! Client settings loaded from YAML

use phoenix_socket::builder::HasEndpoint;
use phoenix_socket::{Socket, SocketBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding the `token` connect param
pub const TOKEN_ENV_VAR: &str = "PHOENIX_CLIENT_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for the lobby client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Socket endpoint, e.g. `ws://localhost:4000/socket`
    pub endpoint: String,
    /// Topics joined on startup
    #[serde(default)]
    pub topics: Vec<String>,
    /// Channel events logged by the client
    #[serde(default = "default_events")]
    pub events: Vec<String>,
    /// Extra connect params appended to the URL
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_events() -> Vec<String> {
    vec!["new_msg".to_string()]
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientSettings {
    /// Load settings from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings = Self::from_yaml(&yaml_content)?;

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            info!("Overriding token param from environment variable");
            settings.params.insert("token".to_string(), token);
        }

        Ok(settings)
    }

    /// Parse and validate settings from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: ClientSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must be a ws:// or wss:// URL, got {:?}",
                self.endpoint
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.topics.iter().any(|topic| topic.trim().is_empty()) {
            return Err(ConfigError::ValidationError("topics must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Socket builder preloaded with these settings
    pub fn socket_builder(&self) -> SocketBuilder<HasEndpoint> {
        Socket::builder()
            .endpoint(self.endpoint.clone())
            .timeout(self.timeout())
            .heartbeat_interval(self.heartbeat_interval())
            .params(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = ClientSettings::from_yaml("endpoint: ws://localhost:4000/socket\n").unwrap();
        assert!(settings.topics.is_empty());
        assert!(settings.params.is_empty());
        assert_eq!(settings.events, vec!["new_msg"]);
        assert_eq!(settings.timeout(), Duration::from_secs(10));
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_rejects_http_endpoint() {
        let err =
            ClientSettings::from_yaml("endpoint: http://localhost:4000/socket\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_zero_heartbeat() {
        let yaml = "endpoint: ws://localhost/socket\nheartbeat_interval_ms: 0\n";
        assert!(matches!(
            ClientSettings::from_yaml(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ClientSettings::from_yaml("endpoint: [unclosed"),
            Err(ConfigError::YamlError(_))
        ));
    }
}
