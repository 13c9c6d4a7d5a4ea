//! HTTP API for the parcelgate carrier proxy.
//!
//! Thin JSON plumbing around the token manager and the carrier gateway:
//!
//! - `POST /login`, `POST /logout`
//! - `POST /cotizar` (quotes), `POST /crear-envio` (shipments)
//! - `GET /health`, `GET /`
//!
//! Errors are rendered as `{success: false, error, message}`.
//!
//! # Example
//!
//! ```ignore
//! use parcelgate_server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::new(ServerConfig::new(), tokens, gateway);
//! Server::from_state(state).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The parcelgate HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::post;

        Router::new()
            .merge(routes::health_routes())
            .route("/login", post(routes::login_handler))
            .route("/logout", post(routes::logout_handler))
            .route("/cotizar", post(routes::quote_handler))
            .route("/crear-envio", post(routes::shipment_handler))
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        let listener = bind(addr).await?;
        let router = self.router();

        info!(
            %addr,
            strategy = self.state.tokens.backend_name(),
            quote_shape = %self.state.gateway.quote_shape(),
            "Starting server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            })
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = bind(addr).await?;
        let router = self.router();

        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use parcelgate_auth::{MockAuthBackend, TokenManager, TokenManagerConfig};
    use parcelgate_carrier::{CarrierConfig, CarrierGateway};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::HealthResponse;

    fn test_server(backend: Arc<MockAuthBackend>) -> Server {
        let tokens = Arc::new(TokenManager::new(backend, TokenManagerConfig::default()));
        let gateway = CarrierGateway::new(CarrierConfig::new("http://127.0.0.1:9/tarifas")).unwrap();
        Server::from_state(AppState::new(ServerConfig::new(), tokens, gateway))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_token_state() {
        let server = test_server(Arc::new(MockAuthBackend::new("tok", Some(3600))));

        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(health.status, "ok");
        assert!(!health.token_cached);
        assert!(!health.token_valid);
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let server = test_server(Arc::new(MockAuthBackend::new("tok", Some(3600))));

        let response = server
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;

        assert_eq!(body["service"], "parcelgate");
        assert_eq!(body["strategy"], "mock");
        assert_eq!(body["quote_shape"], "public_tariff");
        assert!(body["endpoints"]["POST /cotizar"].is_string());
    }

    #[tokio::test]
    async fn test_login_caches_token() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(1000)));
        let server = test_server(backend.clone());
        let router = server.router();

        let response = router
            .clone()
            .oneshot(post_json("/login", r#"{"username":"ops","password":"pw"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["access_token"], "tok-1");
        assert_eq!(body["session_only"], false);
        assert!(body["expires_in"].as_u64().unwrap() <= 900);

        let response = router
            .oneshot(post_json("/login", r#"{"username":"ops","password":"pw"}"#))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["access_token"], "tok-1");
        assert_eq!(backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_envelope() {
        let backend = Arc::new(MockAuthBackend::failing(
            parcelgate_auth::AuthError::InvalidCredentials("rejected".into()),
        ));
        let server = test_server(backend);

        let response = server
            .router()
            .oneshot(post_json("/login", r#"{"username":"ops","password":"bad"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "INVALID_CREDENTIALS");
        assert!(!body["message"].as_str().unwrap().contains("bad"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let server = test_server(Arc::new(MockAuthBackend::new("tok", Some(3600))));

        let response = server
            .router()
            .oneshot(post_json("/login", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let server = test_server(backend);
        let router = server.router();

        router
            .clone()
            .oneshot(post_json("/login", r#"{"username":"ops","password":"pw"}"#))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(post_json("/logout", ""))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["invalidated"], true);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await["token_cached"], false);
    }

    #[tokio::test]
    async fn test_shipment_requires_envio_and_credentials() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let server = test_server(backend.clone());
        let router = server.router();

        let response = router
            .clone()
            .oneshot(post_json("/crear-envio", r#"{"username":"ops","password":"pw"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(post_json("/crear-envio", r#"{"envio":{"a":1}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
        assert_eq!(backend.login_count(), 0);
    }
}
