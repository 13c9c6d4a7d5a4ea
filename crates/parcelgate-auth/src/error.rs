//! Error types for carrier authentication.

use std::time::Duration;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Maximum length for carrier response bodies carried in errors.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors raised while obtaining or using a carrier credential.
///
/// `Clone` because a single in-flight login result is handed to every
/// caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The identity provider rejected the username/password pair.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The login redirect carried no `code` parameter.
    #[error("No authorization code in login redirect")]
    NoAuthorizationCode,

    /// Exchanging the authorization code (or reading the token body) failed.
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// No username/password field matched any candidate selector.
    #[error("Login form not found")]
    LoginFormNotFound,

    /// Navigation after submit never left the login page.
    #[error("Still on login page: {}", message.as_deref().unwrap_or("login did not complete"))]
    StillOnLoginPage { message: Option<String> },

    /// The carrier answered 401 for the presented credential.
    #[error("Token expired or rejected by the carrier")]
    TokenExpired,

    /// The login attempt did not finish in time.
    #[error("Login timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure talking to the identity provider.
    #[error("Network error: {0}")]
    Transport(String),

    /// The headless browser failed or crashed.
    #[error("Browser error: {0}")]
    Browser(String),
}

impl AuthError {
    /// Machine-readable error code used in the HTTP envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            AuthError::NoAuthorizationCode => "NO_AUTHORIZATION_CODE",
            AuthError::TokenExchangeFailed { .. } => "TOKEN_EXCHANGE_FAILED",
            AuthError::LoginFormNotFound => "LOGIN_FORM_NOT_FOUND",
            AuthError::StillOnLoginPage { .. } => "STILL_ON_LOGIN_PAGE",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::Timeout(_) => "LOGIN_TIMEOUT",
            AuthError::Transport(_) => "CARRIER_UNREACHABLE",
            AuthError::Browser(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Transport(format!("request timed out: {}", e))
        } else {
            AuthError::Transport(e.to_string())
        }
    }
}

/// Truncate a response body so errors and logs stay bounded.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        ),
    }
}
