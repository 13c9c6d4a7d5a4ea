//! Error types for the server.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parcelgate_auth::AuthError;
use parcelgate_carrier::GatewayError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Login failed or the carrier rejected the credential.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The carrier rejected a well-formed request.
    #[error("Carrier returned status {status}")]
    Carrier { status: u16, body: String },

    /// The carrier could not be reached.
    #[error("Carrier unreachable: {0}")]
    Unreachable(String),

    /// The carrier answered 2xx with a body we cannot read.
    #[error("Invalid carrier response: {0}")]
    BadCarrierResponse(String),

    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Auth(e) => ServerError::Auth(e),
            GatewayError::Carrier { status, body } => ServerError::Carrier { status, body },
            GatewayError::InvalidRequest(msg) => ServerError::Validation(msg),
            GatewayError::Transport(msg) => ServerError::Unreachable(msg),
            GatewayError::Decode(msg) => ServerError::BadCarrierResponse(msg),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Carrier response body, for carrier errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServerError {
    /// HTTP status and envelope code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Auth(AuthError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, "CARRIER_UNREACHABLE")
            }
            ServerError::Auth(AuthError::Browser(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ServerError::Auth(e) => (StatusCode::UNAUTHORIZED, e.code()),
            ServerError::Carrier { status, .. } => (carrier_status(*status), "CARRIER_ERROR"),
            ServerError::Unreachable(_) => (StatusCode::BAD_GATEWAY, "CARRIER_UNREACHABLE"),
            ServerError::BadCarrierResponse(_) => (StatusCode::BAD_GATEWAY, "CARRIER_ERROR"),
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// The carrier's own status when it is an error status, else 500.
fn carrier_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let details = match self {
            ServerError::Carrier { body, .. } => {
                Some(serde_json::from_str(&body).unwrap_or(Value::String(body)))
            }
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}
