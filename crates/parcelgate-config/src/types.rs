//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]    # listen address
//! [auth]      # login strategy, identity provider endpoints, token policy
//! [carrier]   # quote and shipment endpoints
//! [logging]   # file logging
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Public tariff calculator.
pub const DEFAULT_TARIFF_URL: &str = "https://apis.andreani.com/v1/tarifas";

/// Shipment creation endpoint.
pub const DEFAULT_SHIPMENT_URL: &str = "https://apis.andreani.com/v2/ordenes-de-envio";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelgateConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub carrier: CarrierConfig,
    pub logging: LoggingConfig,
}

impl ParcelgateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Check cross-field requirements for the selected strategy.
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        if !(auth.safety_factor > 0.0 && auth.safety_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "auth.safety_factor must be in (0, 1], got {}",
                auth.safety_factor
            )));
        }
        if auth.default_lifetime_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.default_lifetime_secs must be positive".to_string(),
            ));
        }

        let required: Vec<(&str, &Option<String>)> = match auth.strategy {
            AuthStrategy::Rest | AuthStrategy::Browser => vec![("login_url", &auth.login_url)],
            AuthStrategy::OAuth => vec![
                ("login_url", &auth.login_url),
                ("token_url", &auth.token_url),
                ("client_id", &auth.client_id),
                ("redirect_uri", &auth.redirect_uri),
            ],
            AuthStrategy::Static => Vec::new(),
        };
        for (field, value) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                    context: format!("[auth] for strategy '{}'", auth.strategy),
                });
            }
        }

        if self.carrier.quote_shape == QuoteMode::PrivateQuote && self.carrier.quote_url.is_none()
        {
            return Err(ConfigError::MissingField {
                field: "quote_url".to_string(),
                context: "[carrier] for quote_shape 'private_quote'".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How the proxy logs in to the carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// JSON username/password login endpoint.
    Rest,
    /// OAuth2 authorization-code flow against the identity provider.
    #[serde(rename = "oauth")]
    OAuth,
    /// Headless browser filling the web login form.
    Browser,
    /// A manually supplied token. Public quotes need nothing more.
    #[default]
    Static,
}

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrategy::Rest => "rest",
            AuthStrategy::OAuth => "oauth",
            AuthStrategy::Browser => "browser",
            AuthStrategy::Static => "static",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rest" | "direct" => Ok(AuthStrategy::Rest),
            "oauth" | "oauth2" | "b2c" => Ok(AuthStrategy::OAuth),
            "browser" | "puppeteer" => Ok(AuthStrategy::Browser),
            "static" | "manual" => Ok(AuthStrategy::Static),
            other => Err(format!(
                "unknown strategy '{other}' (expected rest, oauth, browser or static)"
            )),
        }
    }
}

/// Login strategy, identity provider endpoints and token policy.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub strategy: AuthStrategy,
    /// REST login endpoint, OAuth authorize endpoint, or browser login page.
    pub login_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub use_pkce: bool,
    /// Token served by the `static` strategy.
    pub static_token: Option<String>,
    pub static_expires_in: Option<u64>,
    /// Fraction of the announced lifetime a token is trusted for.
    pub safety_factor: f64,
    /// Lifetime assumed when the provider announces none.
    pub default_lifetime_secs: u64,
    pub request_timeout_secs: u64,
    /// Upper bound for a whole browser login.
    pub login_timeout_secs: u64,
    pub browser_executable: Option<PathBuf>,
    pub browser_headful: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            strategy: AuthStrategy::default(),
            login_url: None,
            token_url: None,
            client_id: None,
            redirect_uri: None,
            scope: None,
            use_pkce: true,
            static_token: None,
            static_expires_in: None,
            safety_factor: 0.9,
            default_lifetime_secs: 3600,
            request_timeout_secs: 30,
            login_timeout_secs: 90,
            browser_executable: None,
            browser_headful: false,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("strategy", &self.strategy)
            .field("login_url", &self.login_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("use_pkce", &self.use_pkce)
            .field("static_token", &self.static_token.as_ref().map(|_| "<redacted>"))
            .field("safety_factor", &self.safety_factor)
            .field("default_lifetime_secs", &self.default_lifetime_secs)
            .field("login_timeout_secs", &self.login_timeout_secs)
            .field("browser_executable", &self.browser_executable)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Carrier Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which quote request shape the carrier endpoint expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMode {
    #[default]
    #[serde(alias = "public", alias = "tariff")]
    PublicTariff,
    #[serde(alias = "private", alias = "quote")]
    PrivateQuote,
}

impl FromStr for QuoteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "public" | "public_tariff" | "tariff" => Ok(QuoteMode::PublicTariff),
            "private" | "private_quote" | "quote" => Ok(QuoteMode::PrivateQuote),
            other => Err(format!(
                "unknown quote shape '{other}' (expected public_tariff or private_quote)"
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub tariff_url: String,
    pub quote_url: Option<String>,
    pub shipment_url: String,
    pub quote_shape: QuoteMode,
    pub default_origin_postal_code: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_header: "x-api-key".to_string(),
            tariff_url: DEFAULT_TARIFF_URL.to_string(),
            quote_url: None,
            shipment_url: DEFAULT_SHIPMENT_URL.to_string(),
            quote_shape: QuoteMode::default(),
            default_origin_postal_code: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for CarrierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tariff_url", &self.tariff_url)
            .field("quote_url", &self.quote_url)
            .field("shipment_url", &self.shipment_url)
            .field("quote_shape", &self.quote_shape)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// File logging. Console logging is always on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write daily-rotated JSON logs.
    pub file: bool,
    /// Log directory; defaults to the platform data dir.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            directory: None,
        }
    }
}
