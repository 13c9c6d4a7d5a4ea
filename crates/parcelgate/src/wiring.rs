//! Turns a validated [`ParcelgateConfig`] into the runtime components.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use parcelgate_auth::oauth::DEFAULT_SCOPE;
use parcelgate_auth::{
    OAuthCodeBackend, OAuthConfig, RestLoginBackend, RestLoginConfig, SharedAuthBackend,
    SharedTokenManager, StaticTokenBackend, TokenManager, TokenManagerConfig,
};
use parcelgate_carrier::{CarrierConfig, CarrierGateway, QuoteShape};
use parcelgate_config::{AuthConfig, AuthStrategy, ParcelgateConfig, QuoteMode};
use parcelgate_server::{AppState, ServerConfig};

/// Build the login backend selected by `[auth] strategy`.
pub fn build_backend(auth: &AuthConfig) -> Result<SharedAuthBackend> {
    let request_timeout = Duration::from_secs(auth.request_timeout_secs);

    let backend: SharedAuthBackend = match auth.strategy {
        AuthStrategy::Rest => Arc::new(RestLoginBackend::new(RestLoginConfig {
            login_url: required("login_url", &auth.login_url)?,
            timeout: request_timeout,
        })?),
        AuthStrategy::OAuth => Arc::new(OAuthCodeBackend::new(OAuthConfig {
            client_id: required("client_id", &auth.client_id)?,
            login_url: required("login_url", &auth.login_url)?,
            token_url: required("token_url", &auth.token_url)?,
            redirect_uri: required("redirect_uri", &auth.redirect_uri)?,
            scope: auth
                .scope
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            use_pkce: auth.use_pkce,
            timeout: request_timeout,
        })?),
        AuthStrategy::Browser => browser_backend(auth, required("login_url", &auth.login_url)?)?,
        AuthStrategy::Static => Arc::new(StaticTokenBackend::new(
            auth.static_token.clone(),
            auth.static_expires_in,
        )),
    };
    Ok(backend)
}

#[cfg(feature = "chromium")]
fn browser_backend(auth: &AuthConfig, login_url: String) -> Result<SharedAuthBackend> {
    use parcelgate_auth::{BrowserLoginBackend, BrowserLoginConfig, ChromiumLauncher};

    let mut launcher = ChromiumLauncher::new(auth.browser_executable.clone());
    launcher.headful = auth.browser_headful;
    let mut config = BrowserLoginConfig::new(login_url);
    config.login_timeout = Duration::from_secs(auth.login_timeout_secs);
    Ok(Arc::new(BrowserLoginBackend::new(Arc::new(launcher), config)))
}

#[cfg(not(feature = "chromium"))]
fn browser_backend(_auth: &AuthConfig, _login_url: String) -> Result<SharedAuthBackend> {
    Err(anyhow!(
        "auth strategy 'browser' needs parcelgate built with `--features chromium`"
    ))
}

/// Build the shared token manager around the configured backend.
pub fn build_token_manager(auth: &AuthConfig) -> Result<SharedTokenManager> {
    let backend = build_backend(auth)?;
    let config = TokenManagerConfig {
        safety_factor: auth.safety_factor,
        default_lifetime: Duration::from_secs(auth.default_lifetime_secs),
    };
    Ok(Arc::new(TokenManager::new(backend, config)))
}

/// Map the `[carrier]` section onto the gateway configuration.
pub fn carrier_config(config: &parcelgate_config::CarrierConfig) -> CarrierConfig {
    let mut carrier = CarrierConfig::new(config.tariff_url.clone());
    carrier.api_key = config.api_key.clone();
    carrier.api_key_header = config.api_key_header.clone();
    carrier.quote_url = config.quote_url.clone();
    carrier.shipment_url = Some(config.shipment_url.clone());
    carrier.quote_shape = quote_shape(config.quote_shape);
    carrier.default_origin_postal_code = config.default_origin_postal_code.clone();
    carrier.timeout = Duration::from_secs(config.timeout_secs);
    carrier
}

fn quote_shape(mode: QuoteMode) -> QuoteShape {
    match mode {
        QuoteMode::PublicTariff => QuoteShape::PublicTariff,
        QuoteMode::PrivateQuote => QuoteShape::PrivateQuote,
    }
}

/// HTTP server settings, with optional CLI overrides for port and bind address.
pub fn server_config(
    config: &ParcelgateConfig,
    port: Option<u16>,
    bind: Option<&str>,
) -> Result<ServerConfig> {
    let bind = bind.unwrap_or(&config.server.bind);
    let ip: IpAddr = bind
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;
    let port = port.unwrap_or(config.server.port);

    Ok(ServerConfig::new()
        .with_bind_address(SocketAddr::new(ip, port))
        .with_require_credentials(config.auth.strategy != AuthStrategy::Static))
}

/// Assemble the full application state.
pub fn app_state(config: &ParcelgateConfig, server: ServerConfig) -> Result<AppState> {
    let tokens = build_token_manager(&config.auth)?;
    let gateway = CarrierGateway::new(carrier_config(&config.carrier))?;
    Ok(AppState::new(server, tokens, gateway))
}

fn required(field: &str, value: &Option<String>) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| anyhow!("[auth] {field} is required for this strategy"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_static_backend() {
        let config = ParcelgateConfig::new();
        let tokens = build_token_manager(&config.auth).unwrap();
        assert_eq!(tokens.backend_name(), "static");

        let server = server_config(&config, None, None).unwrap();
        assert!(!server.require_credentials);
        assert_eq!(server.bind_address.port(), 3000);
    }

    #[test]
    fn test_rest_strategy_requires_credentials() {
        let config = ParcelgateConfig::from_toml(
            r#"
            [auth]
            strategy = "rest"
            login_url = "https://login.example.com/login"
            "#,
        )
        .unwrap();

        let tokens = build_token_manager(&config.auth).unwrap();
        assert_eq!(tokens.backend_name(), "rest");
        assert!(server_config(&config, None, None).unwrap().require_credentials);
    }

    #[test]
    fn test_oauth_backend_defaults_scope() {
        let config = ParcelgateConfig::from_toml(
            r#"
            [auth]
            strategy = "oauth"
            login_url = "https://idp.example.com/login"
            token_url = "https://idp.example.com/token"
            client_id = "abc"
            redirect_uri = "https://app.example.com/cb"
            "#,
        )
        .unwrap();
        assert_eq!(build_backend(&config.auth).unwrap().name(), "oauth");
    }

    #[test]
    fn test_missing_login_url_is_reported() {
        let auth = AuthConfig {
            strategy: AuthStrategy::Rest,
            ..AuthConfig::default()
        };
        let err = build_backend(&auth).unwrap_err();
        assert!(err.to_string().contains("login_url"));
    }

    #[cfg(not(feature = "chromium"))]
    #[test]
    fn test_browser_strategy_needs_feature() {
        let auth = AuthConfig {
            strategy: AuthStrategy::Browser,
            login_url: Some("https://pymes.andreani.com/login".to_string()),
            ..AuthConfig::default()
        };
        let err = build_backend(&auth).unwrap_err();
        assert!(err.to_string().contains("--features chromium"));
    }

    #[test]
    fn test_cli_overrides_port_and_bind() {
        let config = ParcelgateConfig::new();
        let server = server_config(&config, Some(8081), Some("127.0.0.1")).unwrap();
        assert_eq!(server.bind_address, "127.0.0.1:8081".parse().unwrap());

        let server = server_config(&config, Some(8081), Some("[::1]")).unwrap();
        assert!(server.bind_address.is_ipv6());

        assert!(server_config(&config, None, Some("not-an-ip")).is_err());
    }

    #[test]
    fn test_carrier_mapping() {
        let config = ParcelgateConfig::from_toml(
            r#"
            [carrier]
            api_key = "k"
            quote_shape = "private_quote"
            quote_url = "https://apis.example.com/v1/cotizaciones"
            default_origin_postal_code = "1414"
            timeout_secs = 5
            "#,
        )
        .unwrap();

        let carrier = carrier_config(&config.carrier);
        assert_eq!(carrier.quote_shape, QuoteShape::PrivateQuote);
        assert_eq!(carrier.api_key.as_deref(), Some("k"));
        assert_eq!(carrier.default_origin_postal_code.as_deref(), Some("1414"));
        assert_eq!(carrier.timeout, Duration::from_secs(5));
        assert!(carrier.shipment_url.is_some());
    }

    #[test]
    fn test_quote_mode_and_shape_accept_the_same_names() {
        for name in [
            "public",
            "public_tariff",
            "PUBLIC-TARIFF",
            "tariff",
            "private",
            "private_quote",
            "quote",
        ] {
            let mode: QuoteMode = name.parse().unwrap();
            let shape: QuoteShape = name.parse().unwrap();
            assert_eq!(quote_shape(mode), shape, "{name}");
        }
        assert!("bogus".parse::<QuoteMode>().is_err());
        assert!("bogus".parse::<QuoteShape>().is_err());
    }

    #[test]
    fn test_app_state_wires_gateway() {
        let config = ParcelgateConfig::new();
        let server = server_config(&config, None, None).unwrap();
        let state = app_state(&config, server).unwrap();
        assert_eq!(state.gateway.quote_shape(), QuoteShape::PublicTariff);
        assert!(!state.tokens.status().cached);
    }
}
