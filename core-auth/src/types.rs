use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The persisted OAuth credential set for the single configured account.
///
/// Every field is optional because providers issue partial updates: a refresh
/// response usually carries a new access token and expiry but omits the
/// refresh token. Fields the broker does not interpret (`scope`,
/// `token_type`, `id_token`, ...) are kept verbatim in [`extra`](Self::extra).
///
/// # Examples
///
/// ```
/// use core_auth::CredentialRecord;
///
/// let stored = CredentialRecord::new("A1", Some("R1".to_string()), Some(1_000));
/// let update = CredentialRecord::new("A2", None, Some(5_000));
///
/// let merged = stored.merged_with(update);
/// assert_eq!(merged.access_token.as_deref(), Some("A2"));
/// assert_eq!(merged.refresh_token.as_deref(), Some("R1"));
/// assert_eq!(merged.expiry_date, Some(5_000));
/// ```
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Short-lived bearer credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Long-lived credential used to mint new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When `access_token` stops being valid (Unix epoch milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    /// Provider fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry_date: Option<i64>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
            expiry_date,
            extra: Map::new(),
        }
    }

    /// Attach a passthrough provider field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge a newer, possibly partial, credential set over this one.
    ///
    /// Fields present in `update` win, with two exceptions:
    /// - `refresh_token` is only replaced by a non-empty value.
    /// - `expiry_date` always follows the update when the update carries an
    ///   access token, so a new token without an expiry is never paired with
    ///   the old token's expiry.
    pub fn merged_with(&self, update: CredentialRecord) -> CredentialRecord {
        let mut merged = self.clone();

        if let Some(access_token) = update.access_token {
            merged.access_token = Some(access_token);
            merged.expiry_date = update.expiry_date;
        } else if update.expiry_date.is_some() {
            merged.expiry_date = update.expiry_date;
        }

        if let Some(refresh_token) = update.refresh_token.filter(|t| !t.is_empty()) {
            merged.refresh_token = Some(refresh_token);
        }

        merged.extra.retain(|key, _| !is_reserved_field(key));
        merged.extra.extend(
            update
                .extra
                .into_iter()
                .filter(|(key, _)| !is_reserved_field(key)),
        );
        merged
    }

    /// Returns the access token if it is usable at `now_ms`.
    pub fn fresh_access_token(&self, now_ms: i64) -> Option<&str> {
        if self.is_stale(now_ms) {
            None
        } else {
            self.access_token.as_deref()
        }
    }

    /// A record is stale when it has no access token, no expiry, or an
    /// expiry strictly earlier than `now_ms`.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        let has_access_token = self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        match self.expiry_date {
            Some(expiry) => !has_access_token || expiry < now_ms,
            None => true,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Non-secret summary of this record at `now_ms`.
    pub fn status(&self, now_ms: i64) -> CredentialStatus {
        CredentialStatus {
            has_access_token: self.access_token.as_deref().is_some_and(|t| !t.is_empty()),
            has_refresh_token: self.has_refresh_token(),
            expiry_date: self.expiry_date,
            is_stale: self.is_stale(now_ms),
        }
    }
}

/// Keys the record owns or the token endpoint uses transiently. They never
/// belong in the passthrough map, where they would be serialized twice.
pub const RESERVED_FIELDS: &[&str] = &["access_token", "refresh_token", "expiry_date", "expires_in"];

pub fn is_reserved_field(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "[REDACTED]" } else { "None" };
        f.debug_struct("CredentialRecord")
            .field("access_token", &redact(self.access_token.is_some()))
            .field("refresh_token", &redact(self.refresh_token.is_some()))
            .field("expiry_date", &self.expiry_date)
            .field("extra_fields", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An access token together with the expiry of the record it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidAccessToken {
    pub access_token: String,
    pub expiry_date: Option<i64>,
}

impl fmt::Debug for ValidAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidAccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// What the broker can safely report about the stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub expiry_date: Option<i64>,
    pub is_stale: bool,
}

/// Parameters for building an authorization URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub scopes: Vec<String>,
    pub access_type: String,
    pub prompt: String,
}

impl AuthorizationRequest {
    /// Request that always yields a refresh token: offline access with a
    /// forced consent screen.
    pub fn offline_consent(scopes: Vec<String>) -> Self {
        Self {
            scopes,
            access_type: "offline".to_string(),
            prompt: "consent".to_string(),
        }
    }
}
