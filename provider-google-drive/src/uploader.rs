//! Google Drive upload connector
//!
//! Creates files through the Drive v3 `uploadType=multipart` endpoint: a
//! single `multipart/related` request carrying the JSON metadata part and
//! the media part.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{GoogleDriveError, Result};
use crate::types::{DriveFile, ErrorResponse, FileMetadata, UploadRequest};

/// Google Drive upload endpoint
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Fields to request for the created file resource
const FILE_FIELDS: &str = "id,name,mimeType,size";

/// Upload requests may carry large bodies
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Google Drive upload connector
///
/// Stateless with respect to credentials: the access token is passed into
/// every call, normally straight from the token lifecycle manager.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::{DriveUploader, UploadRequest};
///
/// let uploader = DriveUploader::new(http_client);
/// let file = uploader
///     .upload(&access_token, UploadRequest::new("notes.txt", "text/plain", bytes))
///     .await?;
/// println!("created {}", file.id);
/// ```
pub struct DriveUploader {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Upload endpoint, overridable for tests
    upload_url: String,
}

impl DriveUploader {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_upload_url(http_client, DRIVE_UPLOAD_URL)
    }

    pub fn with_upload_url(http_client: Arc<dyn HttpClient>, upload_url: impl Into<String>) -> Self {
        Self {
            http_client,
            upload_url: upload_url.into(),
        }
    }

    /// Upload a file and return the created Drive resource.
    ///
    /// # Errors
    ///
    /// - [`GoogleDriveError::AuthenticationFailed`] when Drive answers 401
    /// - [`GoogleDriveError::ApiError`] for any other non-2xx status
    /// - [`GoogleDriveError::ParseError`] if the response is not a file resource
    /// - [`GoogleDriveError::NetworkError`] if the request never completed
    #[instrument(skip(self, access_token, request), fields(name = %request.name, size = request.bytes.len()))]
    pub async fn upload(&self, access_token: &str, request: UploadRequest) -> Result<DriveFile> {
        let boundary = format!("drive-broker-{}", Uuid::new_v4().simple());
        let body = Self::multipart_body(&boundary, &request)?;

        let url = format!(
            "{}?uploadType=multipart&fields={}",
            self.upload_url, FILE_FIELDS
        );

        let http_request = HttpRequest::post(url)
            .bearer_token(access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .header("Accept", "application/json")
            .body(body)
            .timeout(UPLOAD_TIMEOUT);

        debug!("Sending multipart upload to Drive");

        let response = self.http_client.execute(http_request).await.map_err(|e| {
            warn!(error = %e, "Drive upload request failed");
            GoogleDriveError::from(e)
        })?;

        if !response.is_success() {
            return Err(Self::api_error(&response));
        }

        let file: DriveFile = response
            .json()
            .map_err(|e| GoogleDriveError::ParseError(e.to_string()))?;

        info!(file_id = %file.id, mime_type = %file.mime_type, "Uploaded file to Drive");
        Ok(file)
    }

    /// Assemble a `multipart/related` body: metadata part, then media part.
    fn multipart_body(boundary: &str, request: &UploadRequest) -> Result<Bytes> {
        let metadata = serde_json::to_vec(&FileMetadata {
            name: &request.name,
            mime_type: &request.mime_type,
        })
        .map_err(|e| GoogleDriveError::ParseError(format!("Failed to encode metadata: {}", e)))?;

        let mut body = BytesMut::with_capacity(request.bytes.len() + metadata.len() + 256);
        body.put_slice(format!("--{}\r\n", boundary).as_bytes());
        body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.put_slice(&metadata);
        body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        body.put_slice(format!("Content-Type: {}\r\n\r\n", request.mime_type).as_bytes());
        body.put_slice(&request.bytes);
        body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Ok(body.freeze())
    }

    fn api_error(response: &HttpResponse) -> GoogleDriveError {
        let status = response.status;
        let message = response
            .json::<ErrorResponse>()
            .map(|e| e.error.message)
            .or_else(|_| response.text())
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        warn!(status = status, error = %message, "Drive rejected upload");

        if status == 401 {
            GoogleDriveError::AuthenticationFailed(message)
        } else {
            GoogleDriveError::ApiError {
                status_code: status,
                message,
            }
        }
    }
}
