//! Carrier token acquisition for the Andreani proxy.
//!
//! Logs in to the carrier with user credentials through one of several
//! interchangeable backends, caches the resulting token for a safety-trimmed
//! fraction of its lifetime, and collapses concurrent refreshes into a single
//! login.
//!
//! # Components
//!
//! - [`credential`]: credentials, tokens, token records and the in-memory store
//! - [`backend`]: the [`AuthBackend`] trait plus the static-token backend
//! - [`rest`]: JSON username/password login endpoint
//! - [`oauth`]: authorization-code flow with optional PKCE
//! - [`browser`]: headless browser form login (real Chromium behind the `chromium` feature)
//! - [`token_manager`]: cache-or-refresh with single-flight logins

pub mod backend;
pub mod browser;
pub mod credential;
pub mod error;
pub mod oauth;
pub mod rest;
pub mod token_manager;

pub use backend::{AuthBackend, LoginOutcome, SharedAuthBackend, StaticTokenBackend};
pub use browser::{BrowserLauncher, BrowserLoginBackend, BrowserLoginConfig, BrowserPage};
pub use credential::{
    Clock, Credential, CredentialStore, Credentials, ManualClock, SessionCookie, SharedClock,
    SystemClock, TokenRecord,
};
pub use error::{AuthError, Result};
pub use oauth::{OAuthCodeBackend, OAuthConfig, PkceChallenge};
pub use rest::{RestLoginBackend, RestLoginConfig};
pub use token_manager::{
    SharedTokenManager, TokenManager, TokenManagerConfig, TokenSource, TokenStatus,
};

#[cfg(feature = "chromium")]
pub use browser::chromium::ChromiumLauncher;

#[cfg(any(test, feature = "testing"))]
pub use backend::MockAuthBackend;
