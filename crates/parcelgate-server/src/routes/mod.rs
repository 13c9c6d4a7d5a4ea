//! API routes.

pub mod health;
pub mod login;
pub mod quote;
pub mod shipment;

pub use health::{HealthResponse, health_routes};
pub use login::{LoginResponse, login_handler, logout_handler};
pub use quote::{QuoteRequest, quote_handler};
pub use shipment::{ShipmentRequest, shipment_handler};

use parcelgate_auth::{Credential, Credentials, TokenSource};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// A credential for one carrier call, and whether it came from the cache.
pub(crate) struct ResolvedCredential {
    pub credential: Credential,
    pub from_cache: bool,
}

/// Explicit token first; otherwise the cache, logging in with the caller's
/// username and password on a miss.
pub(crate) async fn resolve_credential(
    state: &AppState,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<ResolvedCredential> {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        tracing::debug!("Using caller-supplied carrier token");
        let credential = state.tokens.get_token(TokenSource::Explicit(token)).await?;
        return Ok(ResolvedCredential {
            credential,
            from_cache: false,
        });
    }

    let credentials = match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Credentials::new(username, password)
        }
        (username, _) if !state.config.require_credentials => {
            Credentials::new(username.unwrap_or_default(), String::new())
        }
        _ => {
            return Err(ServerError::Validation(
                "username and password are required when no token is given".to_string(),
            ));
        }
    };

    let credential = state
        .tokens
        .get_token(TokenSource::Credentials(credentials))
        .await?;
    Ok(ResolvedCredential {
        credential,
        from_cache: true,
    })
}
