//! Errors raised while loading the proxy configuration.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override that does not parse (e.g. `PORT=abc`).
    #[error("{key}={value:?} is not valid: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A setting the selected auth strategy or quote shape depends on.
    #[error("{context} requires '{field}'")]
    MissingField { field: String, context: String },

    #[error("{0}")]
    Invalid(String),
}
