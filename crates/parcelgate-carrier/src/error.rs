//! Error types for carrier calls.

use parcelgate_auth::AuthError;
use parcelgate_auth::error::truncate_body;
use reqwest::StatusCode;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Authentication failed or the carrier rejected the credential (401).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The carrier rejected a well-formed request.
    #[error("Carrier error ({status}): {}", truncate_body(.body))]
    Carrier { status: u16, body: String },

    /// The inbound request cannot be turned into a carrier request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The carrier could not be reached or timed out.
    #[error("Carrier unreachable: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be interpreted.
    #[error("Invalid carrier response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Map a non-2xx carrier status. 401 always means the credential is stale.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => GatewayError::Auth(AuthError::TokenExpired),
            _ => GatewayError::Carrier {
                status: status.as_u16(),
                body,
            },
        }
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(self, GatewayError::Auth(AuthError::TokenExpired))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Transport(format!("request timed out: {}", e))
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_401_is_token_expired() {
        let err = GatewayError::from_status(StatusCode::UNAUTHORIZED, "nope".to_string());
        assert!(err.is_token_expired());
    }

    #[test]
    fn test_from_status_keeps_body() {
        let err = GatewayError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "{\"x\":1}".into());
        match err {
            GatewayError::Carrier { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "{\"x\":1}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_display_truncates_long_bodies() {
        let err = GatewayError::Carrier {
            status: 500,
            body: "x".repeat(2000),
        };
        assert!(err.to_string().contains("truncated"));
    }
}
