//! Storage Abstractions
//!
//! Provides the platform-agnostic file I/O trait the credential store is
//! written against.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// Abstracts the small set of file operations needed to keep a single
/// durable document on disk.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save(fs: &dyn FileSystemAccess, data: &[u8]) -> Result<()> {
///     let path = Path::new("token.json");
///     fs.write_file(path, Bytes::copy_from_slice(data)).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace the contents of a file, creating it if it doesn't exist
    ///
    /// Implementations must not leave a partially written file behind: a
    /// reader observes either the previous contents or the new contents.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;
}
