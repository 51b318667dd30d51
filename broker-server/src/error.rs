//! Mapping of domain errors onto HTTP responses.
//!
//! JSON routes answer with [`ApiError`] (`{"error": ..., "message": ...}`),
//! browser routes with [`PageError`], which renders the same classification
//! as an HTML page.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use core_auth::AuthError;
use provider_google_drive::GoogleDriveError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::pages::{render, ErrorPage};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Drive(#[from] GoogleDriveError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to render page: {0}")]
    Render(#[from] askama::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(
                AuthError::NotAuthenticated | AuthError::NoRefreshToken | AuthError::InvalidGrant(_),
            ) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::RefreshFailed(_) | AuthError::ExchangeFailed(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Auth(
                AuthError::CorruptState { .. } | AuthError::Storage(_) | AuthError::Config(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Drive(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(AuthError::NotAuthenticated) => "not_authenticated",
            ApiError::Auth(AuthError::NoRefreshToken) => "no_refresh_token",
            ApiError::Auth(AuthError::InvalidGrant(_)) => "invalid_grant",
            ApiError::Auth(AuthError::RefreshFailed(_)) => "refresh_failed",
            ApiError::Auth(AuthError::ExchangeFailed(_)) => "exchange_failed",
            ApiError::Auth(AuthError::CorruptState { .. }) => "corrupt_state",
            ApiError::Auth(AuthError::Storage(_)) => "storage_error",
            ApiError::Auth(AuthError::Config(_)) => "config_error",
            ApiError::Drive(_) => "upload_failed",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Render(_) => "render_failed",
        }
    }

    fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), code = self.code(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), code = self.code(), error = %self, "Request rejected");
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Error for routes a person reaches with a browser.
#[derive(Debug)]
pub struct PageError(pub ApiError);

impl PageError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        PageError(ApiError::BadRequest(message.into()))
    }
}

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        PageError(err)
    }
}

impl From<AuthError> for PageError {
    fn from(err: AuthError) -> Self {
        PageError(ApiError::Auth(err))
    }
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        PageError(ApiError::Render(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let status = err.status();
        let page = ErrorPage {
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            message: err.to_string(),
        };

        match render(&page) {
            Ok(html) => (status, html).into_response(),
            Err(render_err) => {
                error!(error = %render_err, "Failed to render error page");
                (status, Html(err.to_string())).into_response()
            }
        }
    }
}
