//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use parcelgate_auth::SharedTokenManager;
use parcelgate_carrier::CarrierGateway;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// The process-wide token manager.
    pub tokens: SharedTokenManager,

    /// Carrier client. Holds the same token manager for 401 invalidation.
    pub gateway: Arc<CarrierGateway>,

    /// When the process started serving, for `/health`.
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The gateway is wired to `tokens` so a carrier 401 clears the cache.
    pub fn new(config: ServerConfig, tokens: SharedTokenManager, gateway: CarrierGateway) -> Self {
        let gateway = gateway.with_token_manager(Arc::clone(&tokens));
        Self {
            config: Arc::new(config),
            tokens,
            gateway: Arc::new(gateway),
            started_at: Instant::now(),
        }
    }
}
