//! `POST /crear-envio`.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;
use serde_json::{Value, json};

use super::resolve_credential;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Shipment request; `envio` is forwarded to the carrier untouched.
#[derive(Deserialize)]
pub struct ShipmentRequest {
    pub envio: Option<Value>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

pub async fn shipment_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ShipmentRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let envio = request
        .envio
        .filter(|v| !v.is_null())
        .ok_or_else(|| ServerError::Validation("envio is required".to_string()))?;

    let resolved =
        resolve_credential(&state, request.token, request.username, request.password).await?;
    let created = state
        .gateway
        .create_shipment(&envio, &resolved.credential)
        .await?;

    Ok(Json(json!({ "success": true, "data": created })))
}
