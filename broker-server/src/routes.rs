//! Route handlers.

use axum::extract::{Multipart, Query, State};
use axum::response::{Html, Redirect};
use axum::Json;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, UploadEvent};
use provider_google_drive::{DriveFile, UploadRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::error::{ApiError, PageError};
use crate::pages::{format_expiry, render, CallbackPage, HomePage, UploadPage};
use crate::server::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Name used when the browser sends no file name.
const DEFAULT_FILE_NAME: &str = "upload.bin";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub async fn home(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let status = state.manager.status().await?;
    Ok(render(&HomePage::from_status(status))?)
}

pub async fn login(State(state): State<AppState>) -> Result<Redirect, PageError> {
    let url = state.manager.authorization_url()?;
    info!("Redirecting to authorization endpoint");
    Ok(Redirect::to(&url))
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[instrument(skip_all)]
pub async fn oauth2_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, PageError> {
    if let Some(error) = params.error {
        warn!(provider_error = %error, "Authorization was not granted");
        let message = match params.error_description {
            Some(description) => format!("Authorization failed: {} ({})", error, description),
            None => format!("Authorization failed: {}", error),
        };
        return Err(PageError::bad_request(message));
    }

    let code = match params.code {
        Some(code) if !code.is_empty() => code,
        _ => return Err(PageError::bad_request("No code received")),
    };

    let record = state.manager.complete_authorization(&code).await?;

    let page = CallbackPage {
        has_refresh_token: record.has_refresh_token(),
        expiry: format_expiry(record.expiry_date),
        token_path: state.manager.store().path().display().to_string(),
    };
    Ok(render(&page)?)
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub expiry_date: Option<i64>,
    pub has_refresh_token: bool,
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    let record = state.manager.force_refresh().await?;
    Ok(Json(RefreshResponse {
        expiry_date: record.expiry_date,
        has_refresh_token: record.has_refresh_token(),
    }))
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expiry_date: Option<i64>,
}

pub async fn token(State(state): State<AppState>) -> Result<Json<TokenResponse>, ApiError> {
    let valid = state.manager.valid_access_token().await?;
    Ok(Json(TokenResponse {
        access_token: valid.access_token,
        expiry_date: valid.expiry_date,
    }))
}

pub async fn upload_form() -> Result<Html<String>, PageError> {
    let page = UploadPage {
        max_upload_mb: MAX_UPLOAD_BYTES / (1024 * 1024),
    };
    Ok(render(&page)?)
}

#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DriveFile>, ApiError> {
    let request = read_file_field(&mut multipart).await?;
    let access_token = state.manager.get_valid_access_token().await?;

    let name = request.name.clone();
    let size_bytes = request.bytes.len() as u64;

    match state.uploader.upload(&access_token, request).await {
        Ok(file) => {
            let _ = state.events.emit(CoreEvent::Upload(UploadEvent::Completed {
                file_id: file.id.clone(),
                name: file.name.clone(),
                size_bytes,
            }));
            Ok(Json(file))
        }
        Err(e) => {
            let _ = state.events.emit(CoreEvent::Upload(UploadEvent::Failed {
                name,
                message: e.to_string(),
            }));
            Err(e.into())
        }
    }
}

/// Pull the `file` field out of the form, skipping any other fields.
async fn read_file_field(multipart: &mut Multipart) -> Result<UploadRequest, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let mime_type = field
            .content_type()
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let bytes: Bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(UploadRequest::new(name, mime_type, bytes));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
