//! Quote request types and the outbound parcel representation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Quote parameters as sent by the calling application.
///
/// Fields the proxy does not interpret are kept in `extra` and forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_de_envio_id: Option<Value>,

    #[serde(
        default,
        deserialize_with = "deserialize_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub codigo_postal_origen: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub codigo_postal_destino: Option<String>,

    /// Origin branch, used by the private quote shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sucursal_origen: Option<Value>,

    /// Destination address object, used by the private quote shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destino: Option<Value>,

    #[serde(default)]
    pub bultos: Vec<Bulto>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One parcel: dimensions in centimetres, weight in grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulto {
    pub alto_cm: f64,
    pub ancho_cm: f64,
    pub largo_cm: f64,
    pub peso: f64,
    #[serde(default)]
    pub valor_declarado: f64,
}

impl Bulto {
    pub(crate) fn validate(&self, index: usize) -> Result<(), String> {
        let dims = [
            ("altoCm", self.alto_cm),
            ("anchoCm", self.ancho_cm),
            ("largoCm", self.largo_cm),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("bultos[{index}].{name} must be a positive number"));
            }
        }
        if !self.peso.is_finite() || self.peso < 0.0 {
            return Err(format!("bultos[{index}].peso must not be negative"));
        }
        if !self.valor_declarado.is_finite() || self.valor_declarado < 0.0 {
            return Err(format!("bultos[{index}].valorDeclarado must not be negative"));
        }
        Ok(())
    }
}

/// Parcel as the carrier expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParcel {
    /// Fresh per parcel and per request.
    pub id: Uuid,
    pub alto_cm: f64,
    pub ancho_cm: f64,
    pub largo_cm: f64,
    pub kilos: f64,
    /// Cubic centimetres.
    pub volumen: f64,
    pub valor_declarado: f64,
}

impl From<&Bulto> for WireParcel {
    fn from(bulto: &Bulto) -> Self {
        Self {
            id: Uuid::new_v4(),
            alto_cm: bulto.alto_cm,
            ancho_cm: bulto.ancho_cm,
            largo_cm: bulto.largo_cm,
            kilos: bulto.peso / 1000.0,
            volumen: bulto.alto_cm * bulto.ancho_cm * bulto.largo_cm,
            valor_declarado: bulto.valor_declarado,
        }
    }
}

/// Postal codes arrive both as strings and as numbers.
fn deserialize_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a postal code, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_accept_numeric_postal_codes_and_keep_extras() {
        let params: QuoteParams = serde_json::from_value(json!({
            "tipoDeEnvioId": 1,
            "codigoPostalOrigen": 1414,
            "codigoPostalDestino": "5000",
            "contrato": "400006709",
            "bultos": []
        }))
        .unwrap();

        assert_eq!(params.codigo_postal_origen.as_deref(), Some("1414"));
        assert_eq!(params.codigo_postal_destino.as_deref(), Some("5000"));
        assert_eq!(params.extra.get("contrato"), Some(&json!("400006709")));
    }

    #[test]
    fn test_blank_postal_code_is_absent() {
        let params: QuoteParams =
            serde_json::from_value(json!({"codigoPostalDestino": "  "})).unwrap();
        assert!(params.codigo_postal_destino.is_none());
    }

    #[test]
    fn test_wire_parcel_converts_grams_and_computes_volume() {
        let bulto = Bulto {
            alto_cm: 10.0,
            ancho_cm: 20.0,
            largo_cm: 30.0,
            peso: 1500.0,
            valor_declarado: 1000.0,
        };
        let wire = WireParcel::from(&bulto);

        assert_eq!(wire.kilos, 1.5);
        assert_eq!(wire.volumen, 6000.0);

        let value = serde_json::to_value(&wire).unwrap();
        assert!(value.get("altoCm").is_some());
        assert!(value.get("valorDeclarado").is_some());
        assert!(value.get("peso").is_none());
    }

    #[test]
    fn test_bulto_validation() {
        let mut bulto = Bulto {
            alto_cm: 10.0,
            ancho_cm: 10.0,
            largo_cm: 10.0,
            peso: 500.0,
            valor_declarado: 0.0,
        };
        assert!(bulto.validate(0).is_ok());

        bulto.ancho_cm = 0.0;
        let err = bulto.validate(2).unwrap_err();
        assert!(err.contains("bultos[2].anchoCm"));
    }
}
