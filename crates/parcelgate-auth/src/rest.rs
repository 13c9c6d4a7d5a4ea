//! Direct REST login: one JSON POST, token in the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

use crate::backend::{AuthBackend, LoginOutcome};
use crate::credential::{Credentials, deserialize_lifetime};
use crate::error::{AuthError, Result, truncate_body};

/// Configuration for [`RestLoginBackend`].
#[derive(Debug, Clone)]
pub struct RestLoginConfig {
    pub login_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "token", alias = "accessToken")]
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_lifetime")]
    expires_in: Option<u64>,
}

/// Logs in by posting `{username, password}` to the carrier's login endpoint.
#[derive(Debug, Clone)]
pub struct RestLoginBackend {
    client: Client,
    config: RestLoginConfig,
}

impl RestLoginBackend {
    pub fn new(config: RestLoginConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AuthBackend for RestLoginBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        tracing::debug!(url = %self.config.login_url, username = %credentials.username, "REST login");

        let response = self
            .client
            .post(&self.config.login_url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "REST login rejected");
            return Err(AuthError::InvalidCredentials(format!(
                "login endpoint answered {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body: format!("unreadable login response ({}): {}", e, truncate_body(&body)),
            })?;

        Ok(LoginOutcome::bearer(parsed.access_token, parsed.expires_in))
    }
}
