//! Health check and service index.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Seconds since the server started.
    pub uptime: u64,
    pub token_cached: bool,
    pub token_valid: bool,
}

/// Liveness plus the token cache state.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let token = state.tokens.status();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        token_cached: token.cached,
        token_valid: token.valid,
    })
}

/// Service metadata and endpoint directory.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "parcelgate",
        "description": "Andreani carrier proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "strategy": state.tokens.backend_name(),
        "quote_shape": state.gateway.quote_shape().as_str(),
        "endpoints": {
            "POST /login": "Log in to the carrier and cache the token",
            "POST /cotizar": "Quote a shipment",
            "POST /crear-envio": "Create a shipment",
            "POST /logout": "Drop the cached token",
            "GET /health": "Service and token cache status",
        }
    }))
}

/// Create health and index routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}
