//! The two quote request shapes the carrier exposes.
//!
//! The shape is a deployment decision made in configuration; requests are
//! never inspected to guess it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{GatewayError, Result};
use crate::models::{QuoteParams, WireParcel};

/// Which carrier quote endpoint and body layout to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteShape {
    /// Public tariff calculator: API-key header, keyed by postal codes.
    #[default]
    #[serde(alias = "public", alias = "tariff")]
    PublicTariff,
    /// Authenticated quote: bearer credential, keyed by branch and address.
    #[serde(alias = "private", alias = "quote")]
    PrivateQuote,
}

impl QuoteShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteShape::PublicTariff => "public_tariff",
            QuoteShape::PrivateQuote => "private_quote",
        }
    }

    /// Whether quotes of this shape need a carrier credential.
    pub fn requires_credential(&self) -> bool {
        matches!(self, QuoteShape::PrivateQuote)
    }
}

impl fmt::Display for QuoteShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "public" | "public_tariff" | "tariff" => Ok(QuoteShape::PublicTariff),
            "private" | "private_quote" | "quote" => Ok(QuoteShape::PrivateQuote),
            other => Err(format!("unknown quote shape: {other}")),
        }
    }
}

fn wire_parcels(params: &QuoteParams) -> Result<Vec<WireParcel>> {
    if params.bultos.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "params.bultos must contain at least one parcel".to_string(),
        ));
    }
    params
        .bultos
        .iter()
        .enumerate()
        .map(|(i, bulto)| {
            bulto.validate(i).map_err(GatewayError::InvalidRequest)?;
            Ok(WireParcel::from(bulto))
        })
        .collect()
}

/// Start from the caller's unknown fields so the built keys win on conflict.
fn with_extras(params: &QuoteParams, built: Map<String, Value>) -> Value {
    let mut body = params.extra.clone();
    body.extend(built);
    Value::Object(body)
}

/// Body for the public tariff calculator.
pub fn build_public_tariff(params: &QuoteParams, default_origin: Option<&str>) -> Result<Value> {
    let destination = params.codigo_postal_destino.as_deref().ok_or_else(|| {
        GatewayError::InvalidRequest("params.codigoPostalDestino is required".to_string())
    })?;
    let origin = params
        .codigo_postal_origen
        .as_deref()
        .or(default_origin)
        .ok_or_else(|| {
            GatewayError::InvalidRequest(
                "params.codigoPostalOrigen is required (no default origin configured)".to_string(),
            )
        })?;
    let parcels = wire_parcels(params)?;

    let mut built = Map::new();
    built.insert("codigoPostalOrigen".into(), json!(origin));
    built.insert("codigoPostalDestino".into(), json!(destination));
    if let Some(kind) = &params.tipo_de_envio_id {
        built.insert("tipoDeEnvioId".into(), kind.clone());
    }
    built.insert("bultos".into(), json!(parcels));
    Ok(with_extras(params, built))
}

/// Body for the authenticated quote endpoint.
pub fn build_private_quote(params: &QuoteParams, default_origin: Option<&str>) -> Result<Value> {
    let destination = match (&params.destino, &params.codigo_postal_destino) {
        (Some(address), _) => address.clone(),
        (None, Some(code)) => json!({ "codigoPostal": code }),
        (None, None) => {
            return Err(GatewayError::InvalidRequest(
                "params.destino or params.codigoPostalDestino is required".to_string(),
            ));
        }
    };
    let parcels = wire_parcels(params)?;

    let mut built = Map::new();
    match (&params.sucursal_origen, params.codigo_postal_origen.as_deref().or(default_origin)) {
        (Some(branch), _) => {
            built.insert("sucursalOrigen".into(), branch.clone());
        }
        (None, Some(code)) => {
            built.insert("origen".into(), json!({ "codigoPostal": code }));
        }
        (None, None) => {
            return Err(GatewayError::InvalidRequest(
                "params.sucursalOrigen or params.codigoPostalOrigen is required".to_string(),
            ));
        }
    }
    built.insert("destino".into(), destination);
    if let Some(kind) = &params.tipo_de_envio_id {
        built.insert("tipoDeEnvioId".into(), kind.clone());
    }
    built.insert("bultos".into(), json!(parcels));
    Ok(with_extras(params, built))
}

/// Pull the tariff list out of whatever envelope the carrier used.
pub fn parse_tariffs(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["tarifas", "data", "items"] {
                if matches!(map.get(key), Some(Value::Array(_)))
                    && let Some(Value::Array(items)) = map.remove(key)
                {
                    return items;
                }
            }
            vec![Value::Object(map)]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
