//! Browser-automation login.
//!
//! Drives the carrier's interactive login page through a [`BrowserPage`],
//! probing ordered selector lists for the form, then recovers a token from
//! whatever the page exposed. When the page was left but no token can be
//! found, the login yields a session-only credential carrying the cookies.
//!
//! The page is closed on every exit path, including the overall timeout.

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod port;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::Instant;

use crate::backend::{AuthBackend, LoginOutcome};
use crate::credential::{Credential, Credentials};
use crate::error::{AuthError, Result};

pub use port::{BrowserLauncher, BrowserPage, PageObservations};

/// Interval between selector polls while waiting for the form.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

static ACCESS_TOKEN_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&#]access_token=([^&#]+)").expect("access token pattern is valid")
});

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Selector lists, markers and timeouts for the browser login.
#[derive(Debug, Clone)]
pub struct BrowserLoginConfig {
    pub login_url: String,
    pub username_selectors: Vec<String>,
    pub password_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
    /// Button captions searched when no submit selector matched.
    pub submit_button_texts: Vec<String>,
    pub error_selectors: Vec<String>,
    /// A URL containing any of these (case-insensitive) is a login page.
    pub login_page_markers: Vec<String>,
    /// How long to wait for the form fields to appear.
    pub element_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Pause after navigation so late requests and storage writes land.
    pub settle_delay: Duration,
    /// Upper bound for the whole drive.
    pub login_timeout: Duration,
}

impl Default for BrowserLoginConfig {
    fn default() -> Self {
        Self {
            login_url: String::new(),
            username_selectors: strings(&[
                "input[type=\"email\"]",
                "input[name=\"email\"]",
                "input[name=\"username\"]",
                "#signInName",
                "#logonIdentifier",
                "input[id*=\"email\"]",
                "input[id*=\"user\"]",
                "input[type=\"text\"]",
            ]),
            password_selectors: strings(&[
                "input[type=\"password\"]",
                "input[name=\"password\"]",
                "#password",
            ]),
            submit_selectors: strings(&[
                "button[type=\"submit\"]",
                "input[type=\"submit\"]",
                "#next",
                "#btnLogin",
            ]),
            submit_button_texts: strings(&[
                "Iniciar sesión",
                "Ingresar",
                "Continuar",
                "Sign in",
                "Login",
            ]),
            error_selectors: strings(&[
                ".error.pageLevel",
                ".alert-danger",
                "[role=\"alert\"]",
                ".error",
                "#error",
            ]),
            login_page_markers: strings(&["login", "signin", "b2clogin"]),
            element_timeout: Duration::from_secs(15),
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            login_timeout: Duration::from_secs(90),
        }
    }
}

impl BrowserLoginConfig {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            ..Default::default()
        }
    }

    /// Whether `url` still looks like the login page.
    pub fn is_login_page(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        let login_base = self
            .login_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        (!login_base.is_empty() && url.starts_with(&login_base))
            || self
                .login_page_markers
                .iter()
                .any(|m| url.contains(&m.to_lowercase()))
    }
}

/// Logs in by filling the carrier's web login form.
#[derive(Debug, Clone)]
pub struct BrowserLoginBackend {
    launcher: Arc<dyn BrowserLauncher>,
    config: BrowserLoginConfig,
}

impl BrowserLoginBackend {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: BrowserLoginConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &BrowserLoginConfig {
        &self.config
    }

    async fn drive(&self, page: &mut dyn BrowserPage, credentials: &Credentials) -> Result<LoginOutcome> {
        let cfg = &self.config;
        page.navigate(&cfg.login_url).await?;

        let username_field = wait_for_any(page, &cfg.username_selectors, cfg.element_timeout)
            .await?
            .ok_or(AuthError::LoginFormNotFound)?;
        let password_field = wait_for_any(page, &cfg.password_selectors, cfg.element_timeout)
            .await?
            .ok_or(AuthError::LoginFormNotFound)?;
        tracing::debug!(%username_field, %password_field, "Login form located");

        page.fill_field(&username_field, &credentials.username).await?;
        page.fill_field(&password_field, &credentials.password).await?;
        self.submit(page, &password_field).await?;

        match page.wait_for_navigation(cfg.navigation_timeout).await {
            Ok(()) => {}
            Err(AuthError::Timeout(_)) => tracing::debug!("No navigation after submit"),
            Err(e) => return Err(e),
        }
        if !cfg.settle_delay.is_zero() {
            tokio::time::sleep(cfg.settle_delay).await;
        }

        let url = page.current_url().await?;
        if cfg.is_login_page(&url) {
            let message = first_text(page, &cfg.error_selectors).await?;
            tracing::warn!(username = %credentials.username, "Browser login stayed on the login page");
            return Err(AuthError::StillOnLoginPage { message });
        }

        let observations = page.observations().await?;
        let credential = match extract_token(&observations) {
            Some(token) => Credential::Bearer(token),
            None => {
                tracing::warn!(
                    cookies = observations.cookies.len(),
                    "Login succeeded but no token was recoverable, using session cookies"
                );
                Credential::SessionOnly {
                    marker: format!("session-{}", uuid::Uuid::new_v4()),
                    cookies: observations.cookies,
                }
            }
        };

        Ok(LoginOutcome {
            credential,
            expires_in: None,
        })
    }

    /// Submit selectors, then button text, then Enter in the password field.
    async fn submit(&self, page: &mut dyn BrowserPage, password_field: &str) -> Result<()> {
        if let Some(selector) = first_present(page, &self.config.submit_selectors).await? {
            tracing::debug!(%selector, "Submitting via selector");
            return page.click(&selector).await;
        }
        if page
            .click_button_with_text(&self.config.submit_button_texts)
            .await?
        {
            tracing::debug!("Submitting via button text");
            return Ok(());
        }
        tracing::debug!("Submitting with Enter");
        page.press_enter(password_field).await
    }
}

#[async_trait]
impl AuthBackend for BrowserLoginBackend {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        let mut page = self.launcher.launch().await?;

        let result = tokio::time::timeout(
            self.config.login_timeout,
            self.drive(page.as_mut(), credentials),
        )
        .await;

        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }

        result.unwrap_or(Err(AuthError::Timeout(self.config.login_timeout)))
    }
}

/// First selector in `selectors` that currently matches.
async fn first_present(page: &mut dyn BrowserPage, selectors: &[String]) -> Result<Option<String>> {
    for selector in selectors {
        if page.exists(selector).await? {
            return Ok(Some(selector.clone()));
        }
    }
    Ok(None)
}

/// Poll [`first_present`] until something matches or `timeout` passes.
async fn wait_for_any(
    page: &mut dyn BrowserPage,
    selectors: &[String],
    timeout: Duration,
) -> Result<Option<String>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = first_present(page, selectors).await? {
            return Ok(Some(found));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

async fn first_text(page: &mut dyn BrowserPage, selectors: &[String]) -> Result<Option<String>> {
    for selector in selectors {
        if let Some(text) = page.text_of(selector).await?
            && !text.is_empty()
        {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

fn key_matches(key: &str, needles: &[&str]) -> bool {
    let key = key.to_lowercase();
    needles.iter().any(|n| key.contains(n))
}

/// Token from a local-storage value: raw string or a JSON object holding one.
fn token_from_storage_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => ["access_token", "accessToken", "token", "secret"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        Ok(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Recover a bearer token, in priority order: request query parameter,
/// response `Authorization` header, local storage, cookies.
pub fn extract_token(observations: &PageObservations) -> Option<String> {
    let from_requests = observations.request_urls.iter().find_map(|url| {
        let raw = ACCESS_TOKEN_PARAM.captures(url)?.get(1)?.as_str();
        Some(
            urlencoding::decode(raw)
                .map(|t| t.into_owned())
                .unwrap_or_else(|_| raw.to_string()),
        )
    });
    if from_requests.is_some() {
        return from_requests;
    }

    let from_headers = observations.authorization_headers.iter().find_map(|value| {
        let value = value.trim();
        let (scheme, token) = value.split_once(' ')?;
        (scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty())
            .then(|| token.trim().to_string())
    });
    if from_headers.is_some() {
        return from_headers;
    }

    let from_storage = observations
        .local_storage
        .iter()
        .filter(|(key, _)| key_matches(key, &["token", "auth", "access"]))
        .find_map(|(_, value)| token_from_storage_value(value));
    if from_storage.is_some() {
        return from_storage;
    }

    observations
        .cookies
        .iter()
        .find(|c| key_matches(&c.name, &["token", "auth", "session"]) && !c.value.is_empty())
        .map(|c| c.value.clone())
}
