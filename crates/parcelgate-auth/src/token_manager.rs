//! Token lifecycle: cache, expiry margin, invalidation and single-flight refresh.
//!
//! Concurrent callers that miss the cache share one login future. The record
//! is written to the store inside that future, so every waiter wakes up to a
//! populated cache.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::backend::SharedAuthBackend;
use crate::credential::{
    Credential, CredentialStore, Credentials, DEFAULT_SAFETY_FACTOR, SharedClock, SystemClock,
    TokenRecord,
};
use crate::error::Result;

/// Lifetime assumed when the provider does not announce one.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

type InflightLogin = Shared<BoxFuture<'static, Result<TokenRecord>>>;

/// Expiry policy for cached tokens.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Fraction of the provider lifetime the token is trusted for, in `(0, 1]`.
    pub safety_factor: f64,
    pub default_lifetime: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            safety_factor: DEFAULT_SAFETY_FACTOR,
            default_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }
}

/// Where the credential for one carrier call comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Caller-supplied token; bypasses the cache entirely.
    Explicit(String),
    /// Use the cache, logging in with these credentials on a miss.
    Credentials(Credentials),
}

/// Snapshot of the cache for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatus {
    pub cached: bool,
    pub valid: bool,
    pub expires_in_secs: Option<u64>,
}

/// Orchestrates the credential store and the configured backend.
pub struct TokenManager {
    backend: SharedAuthBackend,
    store: Arc<CredentialStore>,
    clock: SharedClock,
    config: TokenManagerConfig,
    inflight: Mutex<Option<InflightLogin>>,
}

/// Shared token manager for use across handlers.
pub type SharedTokenManager = Arc<TokenManager>;

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

impl TokenManager {
    /// Create a manager with its own empty store and the system clock.
    pub fn new(backend: SharedAuthBackend, config: TokenManagerConfig) -> Self {
        Self {
            backend,
            store: Arc::new(CredentialStore::new()),
            clock: Arc::new(SystemClock),
            config,
            inflight: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// The clock expiry decisions are made against.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Resolve the credential for one carrier call.
    pub async fn get_token(&self, source: TokenSource) -> Result<Credential> {
        match source {
            TokenSource::Explicit(token) => Ok(self.resolve_explicit(token)),
            TokenSource::Credentials(credentials) => {
                Ok(self.get_record(&credentials).await?.credential)
            }
        }
    }

    /// Map a caller-supplied token to a credential without touching the backend.
    ///
    /// A token equal to the cached session-only marker resolves to that
    /// session, so its cookies travel and no bearer header is sent.
    pub fn resolve_explicit(&self, token: String) -> Credential {
        if let Some(record) = self.store.get()
            && let Credential::SessionOnly { marker, .. } = &record.credential
            && *marker == token
        {
            return record.credential;
        }
        Credential::Bearer(token)
    }

    /// Cached record if still valid, otherwise the result of the (shared) login.
    pub async fn get_record(&self, credentials: &Credentials) -> Result<TokenRecord> {
        if let Some(record) = self.store.valid_at(self.clock.now()) {
            tracing::debug!("Token cache hit");
            return Ok(record);
        }

        let login = {
            let mut slot = self.inflight.lock();
            // A login may have finished between the check above and taking the lock.
            if let Some(record) = self.store.valid_at(self.clock.now()) {
                return Ok(record);
            }
            match slot.as_ref() {
                Some(login) => {
                    tracing::debug!("Joining in-flight login");
                    login.clone()
                }
                None => {
                    let login = self.start_login(credentials.clone());
                    *slot = Some(login.clone());
                    login
                }
            }
        };

        let result = login.clone().await;

        {
            let mut slot = self.inflight.lock();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&login)) {
                *slot = None;
            }
        }

        result
    }

    fn start_login(&self, credentials: Credentials) -> InflightLogin {
        let backend = Arc::clone(&self.backend);
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();

        async move {
            tracing::info!(
                backend = backend.name(),
                username = %credentials.username,
                "Logging in to carrier"
            );

            let outcome = backend.login(&credentials).await.inspect_err(|e| {
                tracing::warn!(backend = backend.name(), error = %e, "Carrier login failed");
            })?;

            let lifetime = outcome
                .expires_in
                .unwrap_or(config.default_lifetime.as_secs());
            let record = TokenRecord::new(
                outcome.credential,
                clock.now(),
                lifetime,
                config.safety_factor,
            );
            store.replace(record.clone());

            tracing::info!(
                backend = backend.name(),
                provider_lifetime = lifetime,
                session_only = record.credential.is_session_only(),
                expires_at = %record.expires_at,
                "Carrier token cached"
            );
            Ok(record)
        }
        .boxed()
        .shared()
    }

    /// Clear the cache so the next lookup logs in again.
    pub fn invalidate(&self) -> bool {
        let had = self.store.clear();
        if had {
            tracing::info!("Carrier token invalidated");
        }
        had
    }

    /// Clear the cache only if it holds `credential`, so a rejected
    /// caller-supplied token never evicts a different cached one.
    pub fn invalidate_if_current(&self, credential: &Credential) -> bool {
        match self.store.get() {
            Some(record) if record.credential == *credential => self.invalidate(),
            _ => false,
        }
    }

    pub fn status(&self) -> TokenStatus {
        let now = self.clock.now();
        match self.store.get() {
            Some(record) => TokenStatus {
                cached: true,
                valid: record.is_valid_at(now),
                expires_in_secs: Some(record.expires_in_secs(now)),
            },
            None => TokenStatus {
                cached: false,
                valid: false,
                expires_in_secs: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAuthBackend;
    use crate::credential::{Clock, ManualClock, SessionCookie};
    use crate::error::AuthError;

    fn creds() -> Credentials {
        Credentials::new("ops@example.com", "secret")
    }

    fn manager(backend: Arc<MockAuthBackend>, clock: Arc<ManualClock>) -> TokenManager {
        TokenManager::new(backend, TokenManagerConfig::default()).with_clock(clock)
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_second_login() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let clock = Arc::new(ManualClock::starting_now());
        let tm = manager(backend.clone(), clock.clone());

        let first = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        clock.advance(Duration::from_secs(60));
        let second = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_expiry_margin_triggers_relogin() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(1000)));
        let clock = Arc::new(ManualClock::starting_now());
        let tm = manager(backend.clone(), clock.clone());

        tm.get_token(TokenSource::Credentials(creds())).await.unwrap();

        clock.advance(Duration::from_secs(899));
        assert!(tm.status().valid);
        tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        assert_eq!(backend.login_count(), 1);

        // 0.95E: inside the provider lifetime but past the safety margin.
        clock.advance(Duration::from_secs(51));
        assert!(!tm.status().valid);
        let refreshed = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        assert_eq!(refreshed.as_str(), "tok-2");
        assert_eq!(backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_absurd_provider_lifetime_keeps_manager_usable() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(10_000_000_000_000)));
        let tm = Arc::new(TokenManager::new(
            backend.clone(),
            TokenManagerConfig::default(),
        ));

        let first = {
            let tm = Arc::clone(&tm);
            tokio::spawn(async move { tm.get_token(TokenSource::Credentials(creds())).await })
        };
        let first = first.await.expect("login task must not panic").unwrap();
        assert_eq!(first.as_str(), "tok-1");

        let second = {
            let tm = Arc::clone(&tm);
            tokio::spawn(async move { tm.get_token(TokenSource::Credentials(creds())).await })
        };
        let second = second.await.expect("cached lookup must not panic").unwrap();
        assert_eq!(second, first);
        assert_eq!(backend.login_count(), 1);
        assert!(tm.status().valid);
        assert!(tm.inflight.lock().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_if_current_ignores_other_tokens() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let tm = TokenManager::new(backend, TokenManagerConfig::default());
        let cached = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();

        assert!(!tm.invalidate_if_current(&Credential::bearer("caller-token")));
        assert!(tm.status().cached);

        assert!(tm.invalidate_if_current(&cached));
        assert!(!tm.status().cached);
        assert!(!tm.invalidate_if_current(&cached));
    }

    #[tokio::test]
    async fn test_default_lifetime_when_provider_is_silent() {
        let backend = Arc::new(MockAuthBackend::new("tok", None));
        let clock = Arc::new(ManualClock::starting_now());
        let tm = TokenManager::new(
            backend.clone(),
            TokenManagerConfig {
                default_lifetime: Duration::from_secs(100),
                ..Default::default()
            },
        )
        .with_clock(clock.clone());

        let record = tm.get_record(&creds()).await.unwrap();
        assert_eq!(record.provider_lifetime, 100);
        assert_eq!(record.expires_in_secs(clock.now()), 90);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let backend = Arc::new(
            MockAuthBackend::new("tok", Some(3600)).with_delay(Duration::from_millis(50)),
        );
        let tm = Arc::new(TokenManager::new(
            backend.clone(),
            TokenManagerConfig::default(),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tm = Arc::clone(&tm);
                tokio::spawn(async move { tm.get_token(TokenSource::Credentials(creds())).await })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(backend.login_count(), 1);
        assert!(tokens.iter().all(|t| t.as_str() == "tok-1"));
        assert!(tm.inflight.lock().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let backend = Arc::new(
            MockAuthBackend::failing(AuthError::InvalidCredentials("nope".into()))
                .with_delay(Duration::from_millis(50)),
        );
        let tm = Arc::new(TokenManager::new(
            backend.clone(),
            TokenManagerConfig::default(),
        ));

        let results = futures::future::join_all(
            (0..8).map(|_| tm.get_token(TokenSource::Credentials(creds()))),
        )
        .await;

        assert_eq!(backend.login_count(), 1);
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(AuthError::InvalidCredentials(_))))
        );
        assert!(!tm.store().is_cached());
    }

    #[tokio::test]
    async fn test_failed_login_leaves_cache_empty_and_next_call_retries() {
        let backend = Arc::new(MockAuthBackend::failing(AuthError::LoginFormNotFound));
        let tm = TokenManager::new(backend.clone(), TokenManagerConfig::default());

        assert!(tm.get_token(TokenSource::Credentials(creds())).await.is_err());
        assert!(!tm.status().cached);

        backend.set_failure(None);
        let token = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        assert_eq!(token.as_str(), "unused-2");
        assert_eq!(backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_login() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let tm = TokenManager::new(backend.clone(), TokenManagerConfig::default());

        tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        assert!(tm.invalidate());
        assert!(!tm.invalidate());
        assert_eq!(
            tm.status(),
            TokenStatus {
                cached: false,
                valid: false,
                expires_in_secs: None
            }
        );

        let token = tm.get_token(TokenSource::Credentials(creds())).await.unwrap();
        assert_eq!(token.as_str(), "tok-2");
        assert_eq!(backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_explicit_token_bypasses_backend() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let tm = TokenManager::new(backend.clone(), TokenManagerConfig::default());

        let token = tm
            .get_token(TokenSource::Explicit("caller-token".to_string()))
            .await
            .unwrap();

        assert_eq!(token, Credential::bearer("caller-token"));
        assert_eq!(backend.login_count(), 0);
        assert!(!tm.status().cached);
    }

    #[tokio::test]
    async fn test_explicit_session_marker_resolves_to_cached_session() {
        let backend = Arc::new(MockAuthBackend::new("tok", Some(3600)));
        let tm = TokenManager::new(backend.clone(), TokenManagerConfig::default());
        let session = Credential::SessionOnly {
            marker: "session-abc".to_string(),
            cookies: vec![SessionCookie {
                name: "sid".to_string(),
                value: "1".to_string(),
            }],
        };
        tm.store().replace(TokenRecord::new(
            session.clone(),
            chrono::Utc::now(),
            3600,
            0.9,
        ));

        let resolved = tm.resolve_explicit("session-abc".to_string());
        assert_eq!(resolved, session);
        let other = tm.resolve_explicit("session-other".to_string());
        assert_eq!(other, Credential::bearer("session-other"));
        assert_eq!(backend.login_count(), 0);
    }
}
