//! Credential types and the in-memory credential store.
//!
//! The store holds at most one [`TokenRecord`] per process. It is created once
//! at startup and shared by handle; nothing here is global.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Deserializer, Serialize};

/// Fraction of the provider lifetime a token is trusted for.
pub const DEFAULT_SAFETY_FACTOR: f64 = 0.9;

// ============================================================================
// Credentials
// ============================================================================

/// Caller-supplied login secrets. Never cached past a login attempt.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A cookie captured from a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// What a successful login yields.
///
/// `SessionOnly` is the browser fallback when the page was left but no bearer
/// token could be recovered. The marker is a locally generated placeholder
/// handed to callers; requests made with it carry the captured cookies and no
/// `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    SessionOnly {
        marker: String,
        cookies: Vec<SessionCookie>,
    },
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential::Bearer(token.into())
    }

    /// The string handed back to callers: the token, or the session marker.
    pub fn as_str(&self) -> &str {
        match self {
            Credential::Bearer(token) => token,
            Credential::SessionOnly { marker, .. } => marker,
        }
    }

    /// The bearer token, if this is not a session-only credential.
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Credential::Bearer(token) => Some(token),
            Credential::SessionOnly { .. } => None,
        }
    }

    pub fn is_session_only(&self) -> bool {
        matches!(self, Credential::SessionOnly { .. })
    }

    /// `Cookie` header value for session-only credentials with cookies.
    pub fn cookie_header(&self) -> Option<String> {
        match self {
            Credential::SessionOnly { cookies, .. } if !cookies.is_empty() => Some(
                cookies
                    .iter()
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credential::SessionOnly { cookies, .. } => f
                .debug_struct("SessionOnly")
                .field("cookies", &cookies.len())
                .finish(),
        }
    }
}

/// Accepts `expires_in` as a number or a numeric string.
pub(crate) fn deserialize_lifetime<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lifetime {
        Number(u64),
        Float(f64),
        Text(String),
    }

    match Option::<Lifetime>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lifetime::Number(n)) => Ok(Some(n)),
        Some(Lifetime::Float(f)) if f >= 0.0 => Ok(Some(f as u64)),
        Some(Lifetime::Float(_)) => Ok(None),
        Some(Lifetime::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Time source for expiry decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now += delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// TokenRecord
// ============================================================================

/// Longest provider lifetime trusted, in seconds (one year). Larger values
/// are clamped so expiry arithmetic stays in range.
pub const MAX_PROVIDER_LIFETIME: u64 = 365 * 24 * 60 * 60;

/// A cached credential with its trusted validity window.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub credential: Credential,
    pub issued_at: DateTime<Utc>,
    /// `issued_at + provider_lifetime * safety_factor`.
    pub expires_at: DateTime<Utc>,
    /// Lifetime announced by the provider, in seconds, clamped to
    /// [`MAX_PROVIDER_LIFETIME`].
    pub provider_lifetime: u64,
}

impl TokenRecord {
    pub fn new(
        credential: Credential,
        issued_at: DateTime<Utc>,
        provider_lifetime: u64,
        safety_factor: f64,
    ) -> Self {
        let provider_lifetime = provider_lifetime.min(MAX_PROVIDER_LIFETIME);
        let effective_ms = (provider_lifetime as f64 * 1000.0 * safety_factor.clamp(0.0, 1.0))
            .round() as i64;
        let expires_at = issued_at
            .checked_add_signed(TimeDelta::milliseconds(effective_ms))
            .unwrap_or(issued_at);
        Self {
            credential,
            issued_at,
            expires_at,
            provider_lifetime,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whole seconds left in the trusted window.
    pub fn expires_in_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

// ============================================================================
// CredentialStore
// ============================================================================

/// In-memory holder of the current token record.
#[derive(Debug, Default)]
pub struct CredentialStore {
    record: RwLock<Option<TokenRecord>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached record, valid or not.
    pub fn get(&self) -> Option<TokenRecord> {
        self.record.read().clone()
    }

    /// The cached record if it is still valid at `now`.
    pub fn valid_at(&self, now: DateTime<Utc>) -> Option<TokenRecord> {
        self.record
            .read()
            .as_ref()
            .filter(|r| r.is_valid_at(now))
            .cloned()
    }

    pub fn replace(&self, record: TokenRecord) {
        *self.record.write() = Some(record);
    }

    /// Drop the cached record. Returns whether one was present.
    pub fn clear(&self) -> bool {
        self.record.write().take().is_some()
    }

    pub fn is_cached(&self) -> bool {
        self.record.read().is_some()
    }
}
