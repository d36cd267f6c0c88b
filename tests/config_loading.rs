//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use phoenix_client::bin_common::{
    load_config_from_env, ClientSettings, ConfigError, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH,
};
use std::env;
use std::io::Write;
use std::time::Duration;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_path_from_env() {
    env::set_var(CONFIG_ENV_VAR, "custom/lobby.yaml");
    assert_eq!(load_config_from_env().to_str().unwrap(), "custom/lobby.yaml");

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(load_config_from_env().to_str().unwrap(), DEFAULT_CONFIG_PATH);
}

#[test]
fn test_shipped_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/client.yaml");
    let settings = ClientSettings::load(path).unwrap();
    assert_eq!(settings.endpoint, "ws://localhost:4000/socket");
    assert_eq!(settings.topics, vec!["room:lobby"]);
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
endpoint: wss://chat.example.com/socket
topics: ["room:lobby", "room:42"]
events: [new_msg]
params:
  token: abc
timeout_ms: 2500
heartbeat_interval_ms: 15000
"#,
    );

    let settings = ClientSettings::load(file.path()).unwrap();
    assert_eq!(settings.topics.len(), 2);
    assert_eq!(settings.timeout(), Duration::from_millis(2500));
    assert_eq!(settings.heartbeat_interval(), Duration::from_secs(15));

    let config = settings.socket_builder().config();
    assert_eq!(
        config.endpoint_url(),
        "wss://chat.example.com/socket/websocket?vsn=2.0.0&token=abc"
    );
}

#[test]
fn test_missing_file() {
    let err = ClientSettings::load("does/not/exist.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileError(_)));
}

#[test]
fn test_invalid_endpoint_is_rejected() {
    let file = write_config("endpoint: localhost:4000\n");
    let err = ClientSettings::load(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("Invalid configuration"));
}
