//! HTML pages rendered with `askama`.
//!
//! Templates live under `templates/` and are compiled into the binary. Page
//! models carry display strings only; token values never reach a template.

use askama::Template;
use axum::response::Html;
use chrono::DateTime;
use core_auth::CredentialStatus;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub signed_in: bool,
    pub has_refresh_token: bool,
    pub is_stale: bool,
    pub expiry: String,
}

impl HomePage {
    pub fn from_status(status: Option<CredentialStatus>) -> Self {
        match status {
            Some(status) => Self {
                signed_in: status.has_access_token || status.has_refresh_token,
                has_refresh_token: status.has_refresh_token,
                is_stale: status.is_stale,
                expiry: format_expiry(status.expiry_date),
            },
            None => Self {
                signed_in: false,
                has_refresh_token: false,
                is_stale: true,
                expiry: format_expiry(None),
            },
        }
    }
}

/// Shown after a successful code exchange.
#[derive(Template)]
#[template(path = "callback.html")]
pub struct CallbackPage {
    pub has_refresh_token: bool,
    pub expiry: String,
    pub token_path: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub status: u16,
    pub title: String,
    pub message: String,
}

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadPage {
    pub max_upload_mb: usize,
}

/// Render a page into an axum HTML response body.
pub fn render<T: Template>(page: &T) -> Result<Html<String>, askama::Error> {
    page.render().map(Html)
}

/// Human-readable form of an epoch-milliseconds expiry.
pub fn format_expiry(expiry_date: Option<i64>) -> String {
    expiry_date
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
