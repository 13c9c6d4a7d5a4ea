//! Authentication backend trait and the simple implementations.
//!
//! Every login mechanism the carrier has used (REST, OAuth2 code flow,
//! browser form, manual token) is one [`AuthBackend`], chosen at startup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::{Credential, Credentials};
use crate::error::{AuthError, Result};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub credential: Credential,
    /// Provider lifetime in seconds, when the provider announced one.
    pub expires_in: Option<u64>,
}

impl LoginOutcome {
    pub fn bearer(token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            credential: Credential::bearer(token),
            expires_in,
        }
    }
}

/// A strategy for obtaining a fresh carrier credential.
#[async_trait]
pub trait AuthBackend: Send + Sync + fmt::Debug {
    /// Short name for logs and the service directory.
    fn name(&self) -> &'static str;

    /// Perform a full login. Implementations release every resource they
    /// acquired before returning, on success and on failure.
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome>;
}

/// Shared backend handle.
pub type SharedAuthBackend = Arc<dyn AuthBackend>;

// ============================================================================
// StaticTokenBackend
// ============================================================================

/// Returns a manually supplied token, ignoring the caller's credentials.
pub struct StaticTokenBackend {
    token: Option<String>,
    expires_in: Option<u64>,
}

impl StaticTokenBackend {
    pub fn new(token: Option<String>, expires_in: Option<u64>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            expires_in,
        }
    }
}

impl fmt::Debug for StaticTokenBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenBackend")
            .field("configured", &self.token.is_some())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[async_trait]
impl AuthBackend for StaticTokenBackend {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn login(&self, _credentials: &Credentials) -> Result<LoginOutcome> {
        match &self.token {
            Some(token) => Ok(LoginOutcome::bearer(token.clone(), self.expires_in)),
            None => Err(AuthError::InvalidCredentials(
                "no static carrier token configured".to_string(),
            )),
        }
    }
}

// ============================================================================
// MockAuthBackend (for testing)
// ============================================================================

#[cfg(any(test, feature = "testing"))]
pub use mock::MockAuthBackend;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// Counting backend. Each successful login returns `"{prefix}-{n}"`.
    #[derive(Debug)]
    pub struct MockAuthBackend {
        prefix: String,
        expires_in: Option<u64>,
        delay: Duration,
        failure: Mutex<Option<AuthError>>,
        login_count: AtomicU32,
        usernames: Mutex<Vec<String>>,
    }

    impl MockAuthBackend {
        pub fn new(prefix: impl Into<String>, expires_in: Option<u64>) -> Self {
            Self {
                prefix: prefix.into(),
                expires_in,
                delay: Duration::ZERO,
                failure: Mutex::new(None),
                login_count: AtomicU32::new(0),
                usernames: Mutex::new(Vec::new()),
            }
        }

        /// Every login fails with `error`.
        pub fn failing(error: AuthError) -> Self {
            let backend = Self::new("unused", None);
            *backend.failure.lock() = Some(error);
            backend
        }

        /// Sleep this long inside each login.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Switch failure mode on (`Some`) or off (`None`).
        pub fn set_failure(&self, error: Option<AuthError>) {
            *self.failure.lock() = error;
        }

        pub fn login_count(&self) -> u32 {
            self.login_count.load(Ordering::SeqCst)
        }

        pub fn usernames(&self) -> Vec<String> {
            self.usernames.lock().clone()
        }
    }

    #[async_trait]
    impl AuthBackend for MockAuthBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
            let n = self.login_count.fetch_add(1, Ordering::SeqCst) + 1;
            self.usernames.lock().push(credentials.username.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(err) = self.failure.lock().clone() {
                return Err(err);
            }
            Ok(LoginOutcome::bearer(
                format!("{}-{}", self.prefix, n),
                self.expires_in,
            ))
        }
    }
}
