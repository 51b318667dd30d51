//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Writes are atomic: data goes to a sibling temporary file which is then
/// renamed over the target. On Unix the written file is restricted to the
/// owner (`0600`) unless disabled.
pub struct TokioFileSystem {
    restrict_permissions: bool,
}

impl TokioFileSystem {
    /// Create a new file system accessor that writes owner-only files
    pub fn new() -> Self {
        Self {
            restrict_permissions: true,
        }
    }

    /// Create a file system accessor that leaves file permissions to the umask
    pub fn with_default_permissions() -> Self {
        Self {
            restrict_permissions: false,
        }
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("document"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    #[cfg(unix)]
    async fn restrict(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if self.restrict_permissions {
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(Self::map_io_error)?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn restrict(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

impl TokioFileSystem {
    /// Open the temp file, owner-only from the moment it exists.
    async fn open_temp(&self, temp_path: &Path) -> Result<fs::File> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        if self.restrict_permissions {
            options.mode(0o600);
        }

        let file = options.open(temp_path).await.map_err(Self::map_io_error)?;
        // `mode` only applies on creation; a leftover temp file keeps its own.
        self.restrict(temp_path).await?;
        Ok(file)
    }

    async fn write_temp_and_rename(&self, temp_path: &Path, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = self.open_temp(temp_path).await?;
        file.write_all(data).await.map_err(Self::map_io_error)?;
        file.sync_all().await.map_err(Self::map_io_error)?;
        drop(file);

        fs::rename(temp_path, path).await.map_err(Self::map_io_error)
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_dir_all(parent).await?;
        }

        let temp_path = Self::temp_path_for(path);

        if let Err(e) = self.write_temp_and_rename(&temp_path, path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }
}
