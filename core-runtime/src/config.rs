//! # Broker Configuration Module
//!
//! Provides configuration management for the token broker.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`BrokerConfig`] that holds the OAuth client credentials, the provider
//! endpoints, and the location of the persisted credential record. It
//! enforces fail-fast validation: a missing client id, client secret, or
//! redirect URI aborts startup with an actionable message.
//!
//! ## Environment
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `DRIVE_CLIENT_ID` | yes | |
//! | `DRIVE_CLIENT_SECRET` | yes | |
//! | `DRIVE_REDIRECT_URI` | yes | |
//! | `DRIVE_TOKEN_PATH` | no | `token.json` |
//! | `DRIVE_SCOPES` | no | `https://www.googleapis.com/auth/drive.file` |
//! | `DRIVE_AUTH_URL` | no | Google authorization endpoint |
//! | `DRIVE_TOKEN_URL` | no | Google token endpoint |
//! | `DRIVE_PROVIDER_TIMEOUT_SECS` | no | `30` |
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::BrokerConfig;
//!
//! let config = BrokerConfig::builder()
//!     .client_id("client-id")
//!     .client_secret("client-secret")
//!     .redirect_uri("http://localhost:5050/oauth2callback")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.token_path.to_str(), Some("token.json"));
//! ```
//!
//! Missing credentials fail at build time:
//!
//! ```should_panic
//! use core_runtime::config::BrokerConfig;
//!
//! let config = BrokerConfig::builder()
//!     .client_id("client-id")
//!     .build()
//!     .expect("Should fail - missing client secret and redirect URI");
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const ENV_CLIENT_ID: &str = "DRIVE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DRIVE_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "DRIVE_REDIRECT_URI";
pub const ENV_TOKEN_PATH: &str = "DRIVE_TOKEN_PATH";
pub const ENV_SCOPES: &str = "DRIVE_SCOPES";
pub const ENV_AUTH_URL: &str = "DRIVE_AUTH_URL";
pub const ENV_TOKEN_URL: &str = "DRIVE_TOKEN_URL";
pub const ENV_PROVIDER_TIMEOUT_SECS: &str = "DRIVE_PROVIDER_TIMEOUT_SECS";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the token broker.
///
/// Use [`BrokerConfigBuilder`] or [`BrokerConfig::from_env`] to construct
/// instances; both validate before returning.
#[derive(Clone)]
pub struct BrokerConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,

    /// Scopes requested during authorization
    pub scopes: Vec<String>,

    /// Authorization endpoint URL
    pub auth_url: String,

    /// Token endpoint URL
    pub token_url: String,

    /// Fixed location of the persisted credential record
    pub token_path: PathBuf,

    /// Upper bound on a single call to the token endpoint
    pub provider_timeout: Duration,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("token_path", &self.token_path)
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}

impl BrokerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnv`] naming the first required variable that is
    /// unset or empty, or [`Error::Config`] for malformed values.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| Error::MissingEnv(key.to_string()));

        let mut builder = BrokerConfig::builder()
            .client_id(require(ENV_CLIENT_ID)?)
            .client_secret(require(ENV_CLIENT_SECRET)?)
            .redirect_uri(require(ENV_REDIRECT_URI)?);

        if let Some(path) = get(ENV_TOKEN_PATH) {
            builder = builder.token_path(path);
        }
        if let Some(scopes) = get(ENV_SCOPES) {
            builder = builder.scopes(parse_scopes(&scopes));
        }
        if let Some(url) = get(ENV_AUTH_URL) {
            builder = builder.auth_url(url);
        }
        if let Some(url) = get(ENV_TOKEN_URL) {
            builder = builder.token_url(url);
        }
        if let Some(secs) = get(ENV_PROVIDER_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_PROVIDER_TIMEOUT_SECS, secs
                ))
            })?;
            builder = builder.provider_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are empty, a URL does not parse, no
    /// scope is configured, or the provider timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id cannot be empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Config("client_secret cannot be empty".to_string()));
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
        ] {
            Url::parse(value)
                .map_err(|e| Error::Config(format!("{} '{}' is not a valid URL: {}", name, value, e)))?;
        }

        if self.scopes.is_empty() {
            return Err(Error::Config(
                "at least one OAuth scope must be configured".to_string(),
            ));
        }

        if self.token_path.as_os_str().is_empty() {
            return Err(Error::Config("token_path cannot be empty".to_string()));
        }

        if self.provider_timeout.is_zero() {
            return Err(Error::Config(
                "provider_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Splits a scope list on whitespace and commas.
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for [`BrokerConfig`].
#[derive(Default)]
pub struct BrokerConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    scopes: Option<Vec<String>>,
    auth_url: Option<String>,
    token_url: Option<String>,
    token_path: Option<PathBuf>,
    provider_timeout: Option<Duration>,
}

impl BrokerConfigBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    pub fn token_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    /// Builds the configuration, filling defaults and validating.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required value is missing or invalid.
    pub fn build(self) -> Result<BrokerConfig> {
        let client_id = self
            .client_id
            .ok_or_else(|| Error::Config("client_id is required".to_string()))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| Error::Config("client_secret is required".to_string()))?;
        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| Error::Config("redirect_uri is required".to_string()))?;

        let config = BrokerConfig {
            client_id,
            client_secret,
            redirect_uri,
            scopes: self
                .scopes
                .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]),
            auth_url: self
                .auth_url
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            token_url: self
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            token_path: self
                .token_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            provider_timeout: self.provider_timeout.unwrap_or(DEFAULT_PROVIDER_TIMEOUT),
        };

        config.validate()?;
        Ok(config)
    }
}
