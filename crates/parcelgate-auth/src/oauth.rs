//! OAuth2 authorization-code login against the carrier's B2C identity provider.
//!
//! The login endpoint answers the credential POST with a redirect whose
//! `Location` carries `code=...`; the code is then exchanged at the token
//! endpoint. PKCE is optional and off unless the tenant requires it.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use regex::Regex;
use reqwest::{Client, header, redirect};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::backend::{AuthBackend, LoginOutcome};
use crate::credential::{Credentials, deserialize_lifetime};
use crate::error::{AuthError, Result, truncate_body};

/// Default scope requested from the identity provider.
pub const DEFAULT_SCOPE: &str = "openid offline_access";

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&#]code=([^&#]+)").expect("code pattern is valid"));

/// OAuth configuration for the carrier tenant.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Endpoint receiving the form-encoded credentials.
    pub login_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub use_pkce: bool,
    pub timeout: Duration,
}

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Pull the authorization code out of a redirect location.
pub fn extract_authorization_code(location: &str) -> Option<String> {
    let raw = CODE_PATTERN.captures(location)?.get(1)?.as_str();
    let decoded = urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    (!decoded.is_empty()).then_some(decoded)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_lifetime")]
    expires_in: Option<u64>,
}

/// Two-step authorization-code login.
#[derive(Debug, Clone)]
pub struct OAuthCodeBackend {
    client: Client,
    config: OAuthConfig,
}

impl OAuthCodeBackend {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        // The code travels in the first redirect; following it would lose it.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Step one: post credentials, read the code from the redirect.
    async fn request_code(
        &self,
        credentials: &Credentials,
        pkce: Option<&PkceChallenge>,
    ) -> Result<String> {
        let state = generate_state();
        let mut form: Vec<(&str, &str)> = vec![
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", self.config.scope.as_str()),
            ("state", state.as_str()),
        ];
        if let Some(pkce) = pkce {
            form.push(("code_challenge", pkce.challenge.as_str()));
            form.push(("code_challenge_method", "S256"));
        }

        let response = self
            .client
            .post(&self.config.login_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_redirection() {
            tracing::warn!(status = status.as_u16(), "Login did not redirect");
            return Err(AuthError::NoAuthorizationCode);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::NoAuthorizationCode)?;

        extract_authorization_code(location).ok_or_else(|| {
            tracing::warn!(status = status.as_u16(), "Redirect carried no authorization code");
            AuthError::NoAuthorizationCode
        })
    }

    /// Step two: exchange the code for an access token.
    async fn exchange_code(&self, code: &str, pkce: Option<&PkceChallenge>) -> Result<LoginOutcome> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        if let Some(pkce) = pkce {
            form.push(("code_verifier", pkce.verifier.as_str()));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let tokens: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body: format!("unreadable token response ({}): {}", e, truncate_body(&body)),
            })?;

        Ok(LoginOutcome::bearer(tokens.access_token, tokens.expires_in))
    }
}

#[async_trait]
impl AuthBackend for OAuthCodeBackend {
    fn name(&self) -> &'static str {
        "oauth"
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        let pkce = self.config.use_pkce.then(PkceChallenge::generate);

        let code = self.request_code(credentials, pkce.as_ref()).await?;
        tracing::debug!(username = %credentials.username, "Authorization code received");

        self.exchange_code(&code, pkce.as_ref()).await
    }
}
