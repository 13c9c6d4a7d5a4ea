//! HTTP client for the carrier's quote and shipment endpoints.

use std::time::Duration;

use parcelgate_auth::{AuthError, Credential, SharedTokenManager};
use reqwest::{Client, RequestBuilder, Response, header};
use serde_json::{Value, json};

use crate::error::{GatewayError, Result};
use crate::models::QuoteParams;
use crate::quote::{self, QuoteShape};

/// Default header carrying the public calculator API key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Per-call timeout for carrier requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and credentials for the carrier.
#[derive(Clone)]
pub struct CarrierConfig {
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub tariff_url: String,
    pub quote_url: Option<String>,
    pub shipment_url: Option<String>,
    pub quote_shape: QuoteShape,
    /// Origin postal code used when a public quote names none.
    pub default_origin_postal_code: Option<String>,
    pub timeout: Duration,
}

impl CarrierConfig {
    pub fn new(tariff_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            tariff_url: tariff_url.into(),
            quote_url: None,
            shipment_url: None,
            quote_shape: QuoteShape::default(),
            default_origin_postal_code: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for CarrierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_header", &self.api_key_header)
            .field("tariff_url", &self.tariff_url)
            .field("quote_url", &self.quote_url)
            .field("shipment_url", &self.shipment_url)
            .field("quote_shape", &self.quote_shape)
            .field("default_origin_postal_code", &self.default_origin_postal_code)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Quote and shipment calls against the carrier.
#[derive(Debug, Clone)]
pub struct CarrierGateway {
    client: Client,
    config: CarrierConfig,
    tokens: Option<SharedTokenManager>,
}

impl CarrierGateway {
    pub fn new(config: CarrierConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            tokens: None,
        })
    }

    /// Token manager to invalidate when the carrier rejects a credential.
    pub fn with_token_manager(mut self, tokens: SharedTokenManager) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    pub fn quote_shape(&self) -> QuoteShape {
        self.config.quote_shape
    }

    /// Request tariffs for `params` using the configured shape.
    ///
    /// A 401 surfaces as [`AuthError::TokenExpired`] without retrying; the
    /// caller decides whether to invalidate and try again.
    pub async fn quote(
        &self,
        params: &QuoteParams,
        credential: Option<&Credential>,
    ) -> Result<Vec<Value>> {
        let default_origin = self.config.default_origin_postal_code.as_deref();

        let request = match self.config.quote_shape {
            QuoteShape::PublicTariff => {
                let body = quote::build_public_tariff(params, default_origin)?;
                let mut req = self.client.post(&self.config.tariff_url).json(&body);
                if let Some(key) = &self.config.api_key {
                    req = req.header(self.config.api_key_header.as_str(), key.as_str());
                }
                req
            }
            QuoteShape::PrivateQuote => {
                let credential = credential.ok_or_else(|| {
                    GatewayError::InvalidRequest(
                        "a carrier credential is required for quotes".to_string(),
                    )
                })?;
                let url = self.config.quote_url.as_deref().ok_or_else(|| {
                    GatewayError::InvalidRequest("no quote URL configured".to_string())
                })?;
                let body = quote::build_private_quote(params, default_origin)?;
                authorize(self.client.post(url).json(&body), credential)
            }
        };

        tracing::debug!(
            shape = %self.config.quote_shape,
            parcels = params.bultos.len(),
            "Requesting carrier quote"
        );

        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Carrier rejected quote");
            return Err(GatewayError::from_status(status, body));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(format!("quote response is not JSON: {}", e)))?;
        let tariffs = quote::parse_tariffs(parsed);
        tracing::info!(tariffs = tariffs.len(), "Carrier quote received");
        Ok(tariffs)
    }

    /// Create a shipment; `envio` is forwarded verbatim.
    ///
    /// A 401 invalidates the cached token (when `credential` is the cached
    /// one) before returning [`AuthError::TokenExpired`], so the next attempt
    /// logs in again.
    pub async fn create_shipment(&self, envio: &Value, credential: &Credential) -> Result<Value> {
        let url = self.config.shipment_url.as_deref().ok_or_else(|| {
            GatewayError::InvalidRequest("no shipment URL configured".to_string())
        })?;

        let response = authorize(self.client.post(url), credential)
            .header(header::ACCEPT, "application/json")
            .json(envio)
            .send()
            .await?;
        let (status, body) = read_body(response).await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("Carrier rejected credential on shipment creation");
            if let Some(tokens) = &self.tokens {
                tokens.invalidate_if_current(credential);
            }
            return Err(AuthError::TokenExpired.into());
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Carrier rejected shipment");
            return Err(GatewayError::from_status(status, body));
        }

        tracing::info!(status = status.as_u16(), "Shipment created");
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "created": true, "raw": body })))
    }
}

/// Attach the credential: a bearer header, or the session cookies and no
/// `Authorization` header at all.
fn authorize(req: RequestBuilder, credential: &Credential) -> RequestBuilder {
    match credential {
        Credential::Bearer(token) => req.bearer_auth(token),
        Credential::SessionOnly { .. } => match credential.cookie_header() {
            Some(cookies) => req.header(header::COOKIE, cookies),
            None => req,
        },
    }
}

async fn read_body(response: Response) -> Result<(reqwest::StatusCode, String)> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}
