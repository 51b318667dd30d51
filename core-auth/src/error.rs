use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: no stored credentials, sign in first")]
    NotAuthenticated,

    #[error("Grant rejected by provider: {0}")]
    InvalidGrant(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Stored credential record at {} is unreadable: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("No refresh token stored, sign in again")]
    NoRefreshToken,

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Credential storage failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether the caller can retry without the user signing in again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed(_) | AuthError::ExchangeFailed(_) | AuthError::Storage(_)
        )
    }
}

impl From<core_runtime::Error> for AuthError {
    fn from(err: core_runtime::Error) -> Self {
        AuthError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
