//! Configuration for the parcelgate carrier proxy.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[auth]`, `[carrier]` and `[logging]` sections, all optional
//! - File discovery (`--config`, `./parcelgate.toml`, XDG user config)
//! - An environment overlay for deployment secrets and endpoints
//! - Strategy-aware validation

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ENV_KEYS, LoadedConfig, apply_env, discover_config_file, load_config, load_config_file,
    load_config_with_options, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
