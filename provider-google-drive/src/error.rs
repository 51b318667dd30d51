//! Error types for Google Drive provider

use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Drive rejected the access token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl GoogleDriveError {
    /// HTTP status reported by Drive, if the request reached it.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GoogleDriveError::AuthenticationFailed(_) => Some(401),
            GoogleDriveError::ApiError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<bridge_traits::error::BridgeError> for GoogleDriveError {
    fn from(error: bridge_traits::error::BridgeError) -> Self {
        GoogleDriveError::NetworkError(error.to_string())
    }
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 403,
            message: "The user's Drive storage quota has been exceeded.".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 403): The user's Drive storage quota has been exceeded."
        );
        assert_eq!(error.status_code(), Some(403));
    }

    #[test]
    fn test_bridge_error_conversion() {
        let error: GoogleDriveError =
            bridge_traits::error::BridgeError::Timeout("Request timed out".to_string()).into();

        assert!(matches!(error, GoogleDriveError::NetworkError(_)));
        assert_eq!(error.status_code(), None);
    }
}
