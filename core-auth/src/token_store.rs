//! Credential Record Storage
//!
//! Persists the single [`CredentialRecord`] as a pretty-printed JSON document
//! at a fixed path.
//!
//! ## Guarantees
//!
//! - A missing file is a valid state (nobody has signed in yet).
//! - A file that exists but cannot be read or parsed is fatal
//!   ([`AuthError::CorruptState`]); it is never silently replaced.
//! - A stored refresh token survives updates that omit it.
//! - Load, merge and persist run under one async mutex, so concurrent
//!   writers inside the process never interleave.
//! - Token values are never logged.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialRecord, TokenStore};
//! use bridge_desktop::TokioFileSystem;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! let store = TokenStore::new(Arc::new(TokioFileSystem::new()), "token.json");
//!
//! let update = CredentialRecord::new("ya29.a0", Some("1//0g".to_string()), Some(1_700_000_000_000));
//! let merged = store.merge_and_persist(update).await?;
//! assert!(merged.has_refresh_token());
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::CredentialRecord;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// File-backed store for the credential record.
pub struct TokenStore {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "Initializing TokenStore");
        Self {
            fs,
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the persisted record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record.
    ///
    /// Returns `Ok(None)` when no record has been written yet.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Storage`] if the file system cannot be queried
    /// - [`AuthError::CorruptState`] if the file exists but cannot be read
    ///   or does not hold a credential record
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Option<CredentialRecord>> {
        let exists = self.fs.exists(&self.path).await.map_err(|e| {
            warn!(error = %e, "Failed to check credential file");
            AuthError::Storage(format!("Cannot access {}: {}", self.path.display(), e))
        })?;

        if !exists {
            debug!("No credential record stored");
            return Ok(None);
        }

        let data = self
            .fs
            .read_file(&self.path)
            .await
            .map_err(|e| self.corrupt(e.to_string()))?;

        let record: CredentialRecord =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;

        debug!(
            has_refresh_token = record.has_refresh_token(),
            expiry_date = ?record.expiry_date,
            "Loaded credential record"
        );

        Ok(Some(record))
    }

    /// Merge `update` into the stored record and write the result back.
    ///
    /// An absent record is treated as empty, so the first call persists
    /// `update` as-is. Returns the record as written.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CorruptState`] if the existing record is unreadable;
    ///   nothing is written in that case
    /// - [`AuthError::Storage`] if serialization or the write fails
    #[instrument(skip(self, update), fields(path = %self.path.display()))]
    pub async fn merge_and_persist(&self, update: CredentialRecord) -> Result<CredentialRecord> {
        let _guard = self.write_lock.lock().await;

        let existing = self.load().await?;
        let had_refresh_token = existing
            .as_ref()
            .is_some_and(CredentialRecord::has_refresh_token);
        let update_has_refresh_token = update.has_refresh_token();

        let merged = existing.unwrap_or_default().merged_with(update);

        let json = serde_json::to_vec_pretty(&merged).map_err(|e| {
            AuthError::Storage(format!("Failed to serialize credential record: {}", e))
        })?;

        self.fs
            .write_file(&self.path, Bytes::from(json))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write credential record");
                AuthError::Storage(format!("Cannot write {}: {}", self.path.display(), e))
            })?;

        info!(
            refresh_token_replaced = update_has_refresh_token,
            refresh_token_preserved = had_refresh_token && !update_has_refresh_token,
            expiry_date = ?merged.expiry_date,
            "Credential record persisted"
        );

        Ok(merged)
    }

    fn corrupt(&self, reason: String) -> AuthError {
        warn!(reason = %reason, "Stored credential record is unreadable");
        AuthError::CorruptState {
            path: self.path.clone(),
            reason,
        }
    }
}
