//! # Token Lifecycle Manager
//!
//! Decides when the stored access token can be served as-is and when it has
//! to be refreshed, and drives the one-time authorization code exchange.
//!
//! ## Overview
//!
//! - `get_valid_access_token` serves the cached token while its expiry is
//!   not in the past, otherwise refreshes it with the stored refresh token.
//! - `complete_authorization` exchanges a code and creates the record.
//! - `force_refresh` refreshes regardless of freshness.
//!
//! Refreshes are serialized by an async mutex: a caller that waited behind
//! another refresh re-reads the record and finds it fresh. Provider calls are
//! bounded by a timeout. A failed refresh or exchange leaves the stored
//! record untouched.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{OAuthConfig, OAuthFlowManager, TokenLifecycleManager, TokenStore};
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use bridge_traits::time::SystemClock;
//! use core_runtime::config::BrokerConfig;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! # async fn example(config: BrokerConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Arc::new(SystemClock);
//! let provider = OAuthFlowManager::new(
//!     OAuthConfig::from(&config),
//!     Arc::new(ReqwestHttpClient::new()?),
//!     clock.clone(),
//! );
//! let store = TokenStore::new(Arc::new(TokioFileSystem::new()), config.token_path.clone());
//!
//! let manager = TokenLifecycleManager::new(store, Arc::new(provider), clock, EventBus::default())
//!     .with_scopes(config.scopes.clone())
//!     .with_provider_timeout(config.provider_timeout);
//!
//! let token = manager.get_valid_access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::AuthorizationProvider;
use crate::token_store::TokenStore;
use crate::types::{AuthorizationRequest, CredentialRecord, CredentialStatus, ValidAccessToken};
use bridge_traits::time::Clock;
use core_runtime::config::{DEFAULT_PROVIDER_TIMEOUT, DEFAULT_SCOPE};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Orchestrates the credential lifecycle for the single configured account.
pub struct TokenLifecycleManager {
    store: TokenStore,
    provider: Arc<dyn AuthorizationProvider>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    scopes: Vec<String>,
    provider_timeout: Duration,
    /// Serializes check-and-refresh and code exchange
    refresh_lock: Mutex<()>,
}

impl TokenLifecycleManager {
    pub fn new(
        store: TokenStore,
        provider: Arc<dyn AuthorizationProvider>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            event_bus,
            scopes: vec![DEFAULT_SCOPE.to_string()],
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Scopes requested by [`authorization_url`](Self::authorization_url).
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Upper bound on a single exchange or refresh call.
    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// URL that starts the consent flow.
    ///
    /// Always requests offline access with a forced consent prompt so the
    /// provider issues a refresh token.
    pub fn authorization_url(&self) -> Result<String> {
        self.provider
            .build_authorization_url(&AuthorizationRequest::offline_consent(self.scopes.clone()))
    }

    /// Exchange an authorization code and persist the issued credentials.
    ///
    /// This is the only way a credential record comes into existence.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidGrant`] for an empty or rejected code
    /// - [`AuthError::ExchangeFailed`] for transport, endpoint or timeout failures
    /// - storage errors from [`TokenStore::merge_and_persist`]
    #[instrument(skip(self, code))]
    pub async fn complete_authorization(&self, code: &str) -> Result<CredentialRecord> {
        if code.trim().is_empty() {
            warn!("Rejected empty authorization code");
            return Err(AuthError::InvalidGrant(
                "authorization code is empty".to_string(),
            ));
        }

        let _guard = self.refresh_lock.lock().await;

        let issued = match timeout(
            self.provider_timeout,
            self.provider.exchange_code_for_tokens(code),
        )
        .await
        {
            Ok(Ok(issued)) => issued,
            Ok(Err(e)) => {
                let e = match e {
                    AuthError::InvalidGrant(_) | AuthError::ExchangeFailed(_) => e,
                    other => AuthError::ExchangeFailed(other.to_string()),
                };
                error!(error = %e, "Authorization code exchange failed");
                self.emit_error(&e);
                return Err(e);
            }
            Err(_) => {
                let e = AuthError::ExchangeFailed(format!(
                    "token endpoint did not answer within {:?}",
                    self.provider_timeout
                ));
                error!("Authorization code exchange timed out");
                self.emit_error(&e);
                return Err(e);
            }
        };

        let record = self.store.merge_and_persist(issued).await?;

        if !record.has_refresh_token() {
            warn!("Provider issued no refresh token; the access token cannot be renewed");
        }

        info!(
            has_refresh_token = record.has_refresh_token(),
            expiry_date = ?record.expiry_date,
            "Authorization completed"
        );
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            has_refresh_token: record.has_refresh_token(),
        }));

        Ok(record)
    }

    /// Return an access token that is valid now, refreshing it if needed.
    ///
    /// A stored token whose expiry is at or after the current instant is
    /// returned without any network call.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] if no record exists
    /// - [`AuthError::NoRefreshToken`] if a refresh is needed but impossible
    /// - [`AuthError::InvalidGrant`] / [`AuthError::RefreshFailed`] if the
    ///   refresh fails
    /// - [`AuthError::CorruptState`] if the stored record is unreadable
    pub async fn get_valid_access_token(&self) -> Result<String> {
        self.valid_access_token().await.map(|valid| valid.access_token)
    }

    /// Like [`get_valid_access_token`](Self::get_valid_access_token), also
    /// returning the expiry of the same record.
    ///
    /// Both values are read under one hold of the refresh lock, so they
    /// always belong together.
    #[instrument(skip(self))]
    pub async fn valid_access_token(&self) -> Result<ValidAccessToken> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.load_required().await?;
        let now = self.clock.unix_timestamp_millis();

        if let Some(token) = record.fresh_access_token(now) {
            debug!(expiry_date = ?record.expiry_date, "Access token is valid, no refresh needed");
            return Ok(ValidAccessToken {
                access_token: token.to_string(),
                expiry_date: record.expiry_date,
            });
        }

        info!(expiry_date = ?record.expiry_date, "Access token expired or missing, refreshing");
        let refreshed = self.refresh_locked(&record).await?;

        let access_token = refreshed.access_token.ok_or_else(|| {
            AuthError::RefreshFailed("refreshed record has no access token".to_string())
        })?;
        Ok(ValidAccessToken {
            access_token,
            expiry_date: refreshed.expiry_date,
        })
    }

    /// Refresh the access token regardless of its expiry.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> Result<CredentialRecord> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.load_required().await?;
        info!("Forcing access token refresh");
        self.refresh_locked(&record).await
    }

    /// Non-secret summary of the stored record, `None` before first sign-in.
    pub async fn status(&self) -> Result<Option<CredentialStatus>> {
        let now = self.clock.unix_timestamp_millis();
        Ok(self.store.load().await?.map(|record| record.status(now)))
    }

    async fn load_required(&self) -> Result<CredentialRecord> {
        self.store.load().await?.ok_or_else(|| {
            warn!("No credential record stored");
            AuthError::NotAuthenticated
        })
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let refresh_token = match record.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                error!("No refresh token available");
                let e = AuthError::NoRefreshToken;
                self.emit_error(&e);
                return Err(e);
            }
        };

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let issued = match timeout(
            self.provider_timeout,
            self.provider.refresh_access_token(refresh_token),
        )
        .await
        {
            Ok(Ok(issued)) => issued,
            Ok(Err(e)) => {
                let e = match e {
                    AuthError::InvalidGrant(_) | AuthError::RefreshFailed(_) => e,
                    other => AuthError::RefreshFailed(other.to_string()),
                };
                error!(error = %e, "Token refresh failed");
                self.emit_error(&e);
                return Err(e);
            }
            Err(_) => {
                let e = AuthError::RefreshFailed(format!(
                    "token endpoint did not answer within {:?}",
                    self.provider_timeout
                ));
                error!("Token refresh timed out");
                self.emit_error(&e);
                return Err(e);
            }
        };

        if issued.access_token.as_deref().map_or(true, str::is_empty) {
            let e = AuthError::RefreshFailed("provider returned no access token".to_string());
            error!("Token refresh returned no access token");
            self.emit_error(&e);
            return Err(e);
        }

        let merged = self.store.merge_and_persist(issued).await?;

        info!(expiry_date = ?merged.expiry_date, "Token refreshed successfully");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expiry_date: merged.expiry_date,
            }));

        Ok(merged)
    }

    fn emit_error(&self, e: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: e.to_string(),
            recoverable: e.is_recoverable(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::MockAuthorizationProvider;
    use async_trait::async_trait;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::time::FixedClock;
    use mockall::predicate::eq;
    use serde_json::{json, Value};
    use std::path::Path;

    const NOW: i64 = 1_700_000_000_000;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(
            Arc::new(TokioFileSystem::new()),
            dir.path().join("token.json"),
        )
    }

    fn write_record(path: &Path, value: Value) {
        std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    fn manager_with(
        dir: &tempfile::TempDir,
        provider: impl AuthorizationProvider + 'static,
    ) -> (TokenLifecycleManager, EventBus) {
        let bus = EventBus::new(32);
        let manager = TokenLifecycleManager::new(
            store_in(dir),
            Arc::new(provider),
            Arc::new(FixedClock::from_millis(NOW)),
            bus.clone(),
        );
        (manager, bus)
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed_and_refresh_token_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_record(
            &path,
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1000}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .with(eq("R1"))
            .times(1)
            .returning(|_| Ok(CredentialRecord::new("A2", None, Some(NOW + 3_600_000))));

        let (manager, bus) = manager_with(&dir, provider);
        let mut events = bus.subscribe();

        assert_eq!(manager.get_valid_access_token().await.unwrap(), "A2");

        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            json!({"access_token": "A2", "refresh_token": "R1", "expiry_date": NOW + 3_600_000})
        );

        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshing)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expiry_date: Some(NOW + 3_600_000)
            })
        );
    }

    #[tokio::test]
    async fn test_fresh_token_skips_provider() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW + 10_000}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert_eq!(manager.get_valid_access_token().await.unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_expiry_equal_to_now_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert_eq!(manager.get_valid_access_token().await.unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_missing_expiry_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1"}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Ok(CredentialRecord::new("A2", None, Some(NOW + 1))));

        let (manager, _bus) = manager_with(&dir, provider);
        assert_eq!(manager.get_valid_access_token().await.unwrap(), "A2");
    }

    #[tokio::test]
    async fn test_no_record_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();
        provider.expect_exchange_code_for_tokens().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            manager.force_refresh().await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(manager.status().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_record(
            &path,
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1, "scope": "drive.file"}),
        );
        let before = std::fs::read(&path).unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Err(AuthError::InvalidGrant("invalid_grant (400)".to_string())));

        let (manager, bus) = manager_with(&dir, provider);
        let mut events = bus.subscribe();

        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::InvalidGrant(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);

        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshing)
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::AuthError {
                recoverable: false,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unexpected_provider_error_is_refresh_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .returning(|_| Err(AuthError::Config("bad endpoint".to_string())));

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::RefreshFailed(msg)) if msg.contains("bad endpoint")
        ));
    }

    #[tokio::test]
    async fn test_stale_record_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "", "expiry_date": NOW - 1}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::NoRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_record_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token.json"), b"garbage").unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::CorruptState { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_authorization_creates_record() {
        let dir = tempfile::tempdir().unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_exchange_code_for_tokens()
            .with(eq("4/0Ab"))
            .times(1)
            .returning(|_| Ok(CredentialRecord::new("A0", Some("R0".to_string()), Some(NOW + 3_600_000))));

        let (manager, bus) = manager_with(&dir, provider);
        let mut events = bus.subscribe();

        let record = manager.complete_authorization("4/0Ab").await.unwrap();
        assert_eq!(
            record,
            CredentialRecord::new("A0", Some("R0".to_string()), Some(NOW + 3_600_000))
        );
        assert_eq!(manager.store().load().await.unwrap(), Some(record));
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::SignedIn {
                has_refresh_token: true
            })
        );
    }

    #[tokio::test]
    async fn test_reauthorization_without_refresh_token_keeps_old_one() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_exchange_code_for_tokens()
            .returning(|_| Ok(CredentialRecord::new("A3", None, Some(NOW + 60_000))));

        let (manager, _bus) = manager_with(&dir, provider);
        let record = manager.complete_authorization("code").await.unwrap();
        assert_eq!(record.refresh_token.as_deref(), Some("R1"));
        assert_eq!(record.access_token.as_deref(), Some("A3"));
    }

    #[tokio::test]
    async fn test_empty_code_rejected_without_network() {
        let dir = tempfile::tempdir().unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_exchange_code_for_tokens().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.complete_authorization("  ").await,
            Err(AuthError::InvalidGrant(_))
        ));
        assert!(!dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_failed_exchange_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_exchange_code_for_tokens()
            .returning(|_| Err(AuthError::ExchangeFailed("invalid_client (401)".to_string())));

        let (manager, _bus) = manager_with(&dir, provider);
        assert!(matches!(
            manager.complete_authorization("code").await,
            Err(AuthError::ExchangeFailed(_))
        ));
        assert!(!dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_force_refresh_ignores_freshness() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW + 3_600_000}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Ok(CredentialRecord::new("A2", None, Some(NOW + 7_200_000))));

        let (manager, _bus) = manager_with(&dir, provider);
        let record = manager.force_refresh().await.unwrap();
        assert_eq!(record.access_token.as_deref(), Some("A2"));
        assert!(record.has_refresh_token());
    }

    #[tokio::test]
    async fn test_authorization_url_requests_offline_consent() {
        let dir = tempfile::tempdir().unwrap();

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_build_authorization_url()
            .withf(|request| {
                request.access_type == "offline"
                    && request.prompt == "consent"
                    && request.scopes == vec!["scope.a".to_string()]
            })
            .returning(|_| Ok("https://provider.test/auth?x=1".to_string()));

        let (manager, _bus) = manager_with(&dir, provider);
        let manager = manager.with_scopes(vec!["scope.a".to_string()]);
        assert_eq!(
            manager.authorization_url().unwrap(),
            "https://provider.test/auth?x=1"
        );
    }

    #[tokio::test]
    async fn test_status_reports_staleness() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let (manager, _bus) = manager_with(&dir, MockAuthorizationProvider::new());
        let status = manager.status().await.unwrap().unwrap();
        assert!(status.is_stale);
        assert!(status.has_refresh_token);
        assert_eq!(status.expiry_date, Some(NOW - 1));
    }

    #[tokio::test]
    async fn test_overlapping_callers_refresh_once() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Ok(CredentialRecord::new("A2", None, Some(NOW + 3_600_000))));

        let (manager, _bus) = manager_with(&dir, provider);
        let (first, second) = tokio::join!(
            manager.get_valid_access_token(),
            manager.get_valid_access_token()
        );

        assert_eq!(first.unwrap(), "A2");
        assert_eq!(second.unwrap(), "A2");
    }

    #[tokio::test]
    async fn test_valid_access_token_pairs_token_with_its_expiry() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_refresh_access_token()
            .times(1..=2)
            .returning(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) as i64 + 2;
                Ok(CredentialRecord::new(
                    format!("A{}", n),
                    None,
                    Some(NOW + (n - 1) * 3_600_000),
                ))
            });

        let (manager, _bus) = manager_with(&dir, provider);
        let (first, forced, second) = tokio::join!(
            manager.valid_access_token(),
            manager.force_refresh(),
            manager.valid_access_token()
        );
        forced.unwrap();

        for valid in [first.unwrap(), second.unwrap()] {
            let n: i64 = valid.access_token[1..].parse().unwrap();
            assert_eq!(valid.expiry_date, Some(NOW + (n - 1) * 3_600_000));
        }
    }

    #[tokio::test]
    async fn test_valid_access_token_reports_stored_expiry() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW + 10_000}),
        );

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_refresh_access_token().never();

        let (manager, _bus) = manager_with(&dir, provider);
        assert_eq!(
            manager.valid_access_token().await.unwrap(),
            ValidAccessToken {
                access_token: "A1".to_string(),
                expiry_date: Some(NOW + 10_000),
            }
        );
    }

    /// Provider whose refresh never completes in time.
    struct SlowProvider;

    #[async_trait]
    impl AuthorizationProvider for SlowProvider {
        fn build_authorization_url(&self, _request: &AuthorizationRequest) -> Result<String> {
            Ok("https://provider.test/auth".to_string())
        }

        async fn exchange_code_for_tokens(&self, _code: &str) -> Result<CredentialRecord> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CredentialRecord::default())
        }

        async fn refresh_access_token(&self, _refresh_token: &str) -> Result<CredentialRecord> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CredentialRecord::default())
        }
    }

    #[tokio::test]
    async fn test_provider_timeout_is_classified_per_grant() {
        let dir = tempfile::tempdir().unwrap();
        write_record(
            &dir.path().join("token.json"),
            json!({"access_token": "A1", "refresh_token": "R1", "expiry_date": NOW - 1}),
        );

        let (manager, _bus) = manager_with(&dir, SlowProvider);
        let manager = manager.with_provider_timeout(Duration::from_millis(20));

        assert!(matches!(
            manager.get_valid_access_token().await,
            Err(AuthError::RefreshFailed(_))
        ));
        assert!(matches!(
            manager.complete_authorization("code").await,
            Err(AuthError::ExchangeFailed(_))
        ));
    }
}
