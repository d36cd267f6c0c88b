//! Phoenix Client - Main Library
//!
//! Application crate around the `phoenix-socket` workspace library.
//!
//! ## Architecture
//!
//! - **bin_common**: Shared utilities for the binaries (config loading, tracing, shutdown)
//! - **phoenix_socket**: Channel client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use phoenix_client::bin_common::{load_config_from_env, ClientSettings};
//! use phoenix_client::phoenix_socket::Socket;
//! ```

// Re-export workspace libraries for convenience
pub use phoenix_socket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;
    pub mod settings;

    pub use cli::{load_config_from_env, parse_args, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
    pub use runner::{init_tracing, ShutdownSignal};
    pub use settings::{ClientSettings, ConfigError};
}
