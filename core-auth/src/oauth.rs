//! OAuth 2.0 Authorization Provider
//!
//! The [`AuthorizationProvider`] trait is the seam between the token
//! lifecycle logic and the external authorization service. The provider is
//! stateless with respect to credentials: every call receives the code or
//! refresh token it needs and returns a fresh [`CredentialRecord`].
//!
//! [`OAuthFlowManager`] implements the trait against the standard RFC 6749
//! token endpoint using an injected [`HttpClient`].
//!
//! # Security
//!
//! Codes, tokens and the client secret are skipped from every span and log
//! line. Error bodies from the token endpoint are reduced to the OAuth
//! `error` / `error_description` fields.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use core_auth::{AuthorizationProvider, AuthorizationRequest};
//! use bridge_traits::time::SystemClock;
//! use std::sync::Arc;
//!
//! # fn example(http_client: Arc<dyn bridge_traits::HttpClient>) -> core_auth::Result<()> {
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: "your-client-secret".to_string(),
//!     redirect_uri: "http://localhost:5050/oauth2callback".to_string(),
//!     auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
//!     token_url: "https://oauth2.googleapis.com/token".to_string(),
//! };
//!
//! let provider = OAuthFlowManager::new(config, http_client, Arc::new(SystemClock));
//! let url = provider.build_authorization_url(&AuthorizationRequest::offline_consent(vec![
//!     "https://www.googleapis.com/auth/drive.file".to_string(),
//! ]))?;
//! // Redirect the user to `url`...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{is_reserved_field, AuthorizationRequest, CredentialRecord};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use core_runtime::config::BrokerConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// External OAuth service consumed by the lifecycle manager.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Build the URL the user visits to grant access.
    fn build_authorization_url(&self, request: &AuthorizationRequest) -> Result<String>;

    /// Exchange an authorization code for a full credential set.
    ///
    /// Fails with [`AuthError::InvalidGrant`] when the provider rejects the
    /// code, otherwise [`AuthError::ExchangeFailed`].
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<CredentialRecord>;

    /// Mint a new access token from a refresh token.
    ///
    /// Fails with [`AuthError::InvalidGrant`] when the refresh token is
    /// revoked or unknown, otherwise [`AuthError::RefreshFailed`].
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<CredentialRecord>;
}

/// OAuth 2.0 client registration and endpoints.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl From<&BrokerConfig> for OAuthConfig {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
        }
    }
}

/// Which grant a token request carries; drives error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    fn failure(self, message: String) -> AuthError {
        match self {
            Grant::AuthorizationCode => AuthError::ExchangeFailed(message),
            Grant::RefreshToken => AuthError::RefreshFailed(message),
        }
    }
}

/// Token endpoint client speaking the authorization-code and refresh-token
/// grants.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    /// POST a form-encoded grant and convert the response into a record.
    async fn request_tokens(&self, grant: Grant, params: &[(&str, &str)]) -> Result<CredentialRecord> {
        let request = HttpRequest::post(self.config.token_url.clone())
            .header("Accept", "application/json")
            .form(params)
            .map_err(|e| grant.failure(format!("Failed to encode token request: {}", e)))?;

        // Token calls are sent once: a code is single-use and a failed
        // refresh must surface to the caller.
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| {
                warn!(error = %e, grant = ?grant, "Token endpoint unreachable");
                grant.failure(format!("Token endpoint request failed: {}", e))
            })?;

        if !response.is_success() {
            return Err(Self::classify_error(grant, &response));
        }

        let token_response: TokenResponse = response.json().map_err(|e| {
            warn!(grant = ?grant, "Token endpoint returned an unparsable body");
            grant.failure(format!("Failed to parse token response: {}", e))
        })?;

        let expiry_date = self.expiry_date(grant, &token_response)?;

        info!(
            grant = ?grant,
            expiry_date = expiry_date,
            has_refresh_token = token_response.refresh_token.is_some(),
            "Token endpoint issued credentials"
        );

        let mut extra = token_response.extra;
        extra.retain(|key, _| !is_reserved_field(key));

        Ok(CredentialRecord {
            access_token: Some(token_response.access_token),
            refresh_token: token_response.refresh_token,
            expiry_date: Some(expiry_date),
            extra,
        })
    }

    /// Absolute expiry in epoch milliseconds.
    ///
    /// An `expiry_date` sent by the endpoint wins; otherwise `expires_in` is
    /// counted from now. Non-positive or overflowing values are rejected.
    fn expiry_date(&self, grant: Grant, response: &TokenResponse) -> Result<i64> {
        if let Some(expiry_date) = response.expiry_date {
            if expiry_date <= 0 {
                return Err(grant.failure(format!(
                    "Token endpoint returned invalid expiry_date {}",
                    expiry_date
                )));
            }
            return Ok(expiry_date);
        }

        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        if expires_in <= 0 {
            return Err(grant.failure(format!(
                "Token endpoint returned invalid expires_in {}",
                expires_in
            )));
        }

        expires_in
            .checked_mul(1000)
            .and_then(|ms| self.clock.unix_timestamp_millis().checked_add(ms))
            .ok_or_else(|| {
                grant.failure(format!("Token endpoint returned out-of-range expires_in {}", expires_in))
            })
    }

    fn classify_error(grant: Grant, response: &HttpResponse) -> AuthError {
        let status = response.status;
        let body: Option<TokenErrorResponse> = response.json().ok();

        let (code, description) = match &body {
            Some(err) => (err.error.as_str(), err.error_description.as_deref()),
            None => ("unknown_error", None),
        };

        warn!(
            status = status,
            error = code,
            description = description.unwrap_or(""),
            grant = ?grant,
            "Token endpoint rejected request"
        );

        let message = match description {
            Some(description) => format!("{} ({}): {}", code, status, description),
            None => format!("{} ({})", code, status),
        };

        if code == "invalid_grant" {
            AuthError::InvalidGrant(message)
        } else {
            grant.failure(message)
        }
    }
}

#[async_trait]
impl AuthorizationProvider for OAuthFlowManager {
    #[instrument(skip(self, request), fields(scopes = request.scopes.len()))]
    fn build_authorization_url(&self, request: &AuthorizationRequest) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Config(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &request.scopes.join(" "));
            query.append_pair("access_type", &request.access_type);
            query.append_pair("prompt", &request.prompt);
        }

        debug!("Built authorization URL");
        Ok(url.to_string())
    }

    #[instrument(skip(self, code))]
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<CredentialRecord> {
        debug!("Exchanging authorization code for tokens");
        self.request_tokens(
            Grant::AuthorizationCode,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ],
        )
        .await
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<CredentialRecord> {
        debug!("Refreshing access token");
        self.request_tokens(
            Grant::RefreshToken,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ],
        )
        .await
    }
}

/// Successful token endpoint response.
///
/// `expires_in` is converted to an absolute `expiry_date` and not kept.
/// An absolute `expiry_date` is taken as-is. Anything else the endpoint
/// sends is passed through.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expiry_date: Option<i64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// RFC 6749 §5.2 error response.
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
