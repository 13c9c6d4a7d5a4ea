//! Andreani carrier client.
//!
//! Builds quote requests in one of two configured shapes, creates shipments,
//! and turns carrier responses into typed outcomes. A 401 from the carrier is
//! always reported as [`parcelgate_auth::AuthError::TokenExpired`].

pub mod error;
pub mod gateway;
pub mod models;
pub mod quote;

pub use error::{GatewayError, Result};
pub use gateway::{CarrierConfig, CarrierGateway, DEFAULT_API_KEY_HEADER};
pub use models::{Bulto, QuoteParams, WireParcel};
pub use quote::QuoteShape;
