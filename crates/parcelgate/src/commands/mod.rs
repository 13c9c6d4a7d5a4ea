//! CLI command handlers.

pub mod login;
pub mod serve;

use parcelgate_config::ParcelgateConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded, env-overlaid and validated configuration.
    pub config: ParcelgateConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}
