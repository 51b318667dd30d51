//! # Google Drive Provider
//!
//! Drive API v3 upload connector.
//!
//! ## Overview
//!
//! This crate provides:
//! - Multipart file uploads (`uploadType=multipart`)
//! - Drive error envelopes mapped to [`GoogleDriveError`]
//!
//! It consumes an access token and never stores one; callers obtain a valid
//! token from `core_auth::TokenLifecycleManager` before every upload.

pub mod error;
pub mod types;
pub mod uploader;

pub use error::{GoogleDriveError, Result};
pub use types::{DriveFile, UploadRequest};
pub use uploader::{DriveUploader, DRIVE_UPLOAD_URL};
