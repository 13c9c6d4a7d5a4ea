//! Login and logout.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use parcelgate_auth::Credentials;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    /// Bearer token, or the session marker for session-only logins.
    pub access_token: String,
    /// Seconds the proxy will keep using this token.
    pub expires_in: u64,
    /// True when only a browser session (cookies) could be captured.
    pub session_only: bool,
}

/// `POST /login`: obtain (or reuse) the cached carrier token.
pub async fn login_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(credentials) = payload?;
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(ServerError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let record = state.tokens.get_record(&credentials).await?;
    let now = state.tokens.clock().now();

    Ok(Json(LoginResponse {
        success: true,
        access_token: record.credential.as_str().to_string(),
        expires_in: record.expires_in_secs(now),
        session_only: record.credential.is_session_only(),
    }))
}

/// `POST /logout`: drop the cached token.
pub async fn logout_handler(State(state): State<AppState>) -> Json<Value> {
    let invalidated = state.tokens.invalidate();
    Json(json!({ "success": true, "invalidated": invalidated }))
}
