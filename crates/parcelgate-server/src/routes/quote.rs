//! `POST /cotizar`.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use parcelgate_carrier::QuoteParams;
use serde::Deserialize;
use serde_json::{Value, json};

use super::resolve_credential;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Quote request. Credentials are only consulted when the configured quote
/// shape needs a carrier token.
#[derive(Deserialize)]
pub struct QuoteRequest {
    pub params: Option<QuoteParams>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

pub async fn quote_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let params = request
        .params
        .ok_or_else(|| ServerError::Validation("params is required".to_string()))?;

    let resolved = if state.gateway.quote_shape().requires_credential() {
        Some(resolve_credential(&state, request.token, request.username, request.password).await?)
    } else {
        None
    };

    let result = state
        .gateway
        .quote(&params, resolved.as_ref().map(|r| &r.credential))
        .await;

    match result {
        Ok(tariffs) => Ok(Json(json!({ "success": true, "data": tariffs }))),
        Err(e) => {
            // The gateway does not invalidate on quote 401s; a rejected cached
            // token must not be served again.
            if e.is_token_expired() && resolved.as_ref().is_some_and(|r| r.from_cache) {
                state.tokens.invalidate();
            }
            Err(e.into())
        }
    }
}
