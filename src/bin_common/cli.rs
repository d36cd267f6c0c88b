//! CLI utilities for binaries
//!
//! Resolves the client configuration path from the environment.

use std::path::PathBuf;

/// Environment variable naming the client configuration file
pub const CONFIG_ENV_VAR: &str = "PHOENIX_CLIENT_CONFIG";

/// Path used when [`CONFIG_ENV_VAR`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/client.yaml";

/// Load the configuration path from the environment or use the default
///
/// A `.env` file in the working directory is read first, if present.
///
/// # Examples
/// ```
/// use phoenix_client::bin_common::load_config_from_env;
///
/// let path = load_config_from_env();
/// assert!(path.extension().is_some());
/// ```
pub fn load_config_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    resolve_config_path(std::env::var(CONFIG_ENV_VAR).ok())
}

fn resolve_config_path(value: Option<String>) -> PathBuf {
    value
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_when_unset() {
        assert_eq!(resolve_config_path(None), PathBuf::from("config/client.yaml"));
    }

    #[test]
    fn test_blank_value_falls_back_to_default() {
        assert_eq!(
            resolve_config_path(Some("  ".to_string())),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_config_path(Some("custom/lobby.yaml".to_string())),
            PathBuf::from("custom/lobby.yaml")
        );
    }
}
