//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wiremock::MockServer;

use parcelgate_auth::{MockAuthBackend, SharedTokenManager, TokenManager, TokenManagerConfig};
use parcelgate_carrier::{CarrierConfig, CarrierGateway, QuoteShape};
use parcelgate_server::{AppState, Server, ServerConfig};

/// A proxy running in the background against a mocked carrier.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client for talking to the proxy.
    pub client: Client,
    /// Mocked carrier API.
    pub carrier: MockServer,
    /// Login backend standing in for the identity provider.
    pub backend: Arc<MockAuthBackend>,
    pub tokens: SharedTokenManager,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Public-tariff quotes, tokens `tok-1`, `tok-2`, ...
    pub async fn start() -> Result<Self> {
        Self::start_with(
            MockAuthBackend::new("tok", Some(3600)),
            QuoteShape::PublicTariff,
        )
        .await
    }

    pub async fn start_with(backend: MockAuthBackend, shape: QuoteShape) -> Result<Self> {
        let carrier = MockServer::start().await;
        let backend = Arc::new(backend);
        let tokens = Arc::new(TokenManager::new(
            backend.clone(),
            TokenManagerConfig::default(),
        ));

        let mut carrier_config = CarrierConfig::new(format!("{}/v1/tarifas", carrier.uri()));
        carrier_config.api_key = Some("test-api-key".to_string());
        carrier_config.quote_url = Some(format!("{}/v1/cotizaciones", carrier.uri()));
        carrier_config.shipment_url = Some(format!("{}/v2/ordenes-de-envio", carrier.uri()));
        carrier_config.default_origin_postal_code = Some("1414".to_string());
        carrier_config.quote_shape = shape;
        carrier_config.timeout = Duration::from_secs(5);
        let gateway = CarrierGateway::new(carrier_config)?;

        let addr = find_available_port().await?;
        let config = ServerConfig::new().with_bind_address(addr);
        let state = AppState::new(config, Arc::clone(&tokens), gateway);

        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            carrier,
            backend,
            tokens,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// POST a JSON body and return the status and parsed response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<(u16, Value)> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?;
        Ok(resp.json().await?)
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
