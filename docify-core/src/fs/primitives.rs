//! ``src/fs/primitives.rs``
//! ============================================================================
//! # `FileSystem`: the filesystem seam used by the lister and the engine
//!
//! All filesystem access in the core goes through this trait so the engine can
//! be exercised against fault-injecting wrappers. `LocalFileSystem` is the
//! production implementation over `tokio::fs`.

use crate::error::AppError;
use crate::fs::object_info::DirectoryEntry;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as TokioFs;
use tracing::{debug, trace};

/// Raw `EXDEV` errno, reported when a rename crosses a device boundary.
const EXDEV: i32 = 18;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Immediate children of `dir`, unsorted.
    async fn read_directory(&self, dir: &Path) -> Result<Vec<DirectoryEntry>, AppError>;

    async fn exists(&self, path: &Path) -> Result<bool, AppError>;

    /// Snapshot of a single path.
    async fn entry(&self, path: &Path) -> Result<DirectoryEntry, AppError>;

    /// Create `path` and any missing parents; existing directories are fine.
    async fn mkdir(&self, path: &Path) -> Result<(), AppError>;

    /// Copy file bytes, returning the number copied.
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64, AppError>;

    /// Move a file, or rename a directory within the same filesystem.
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), AppError>;

    async fn delete_file(&self, path: &Path) -> Result<(), AppError>;

    async fn delete_directory_recursive(&self, path: &Path) -> Result<(), AppError>;

    /// Remove a directory that must already be empty.
    async fn remove_empty_dir(&self, path: &Path) -> Result<(), AppError>;
}

/// `FileSystem` over the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_directory(&self, dir: &Path) -> Result<Vec<DirectoryEntry>, AppError> {
        let unreadable = |source| AppError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        };

        let mut read_dir = TokioFs::read_dir(dir).await.map_err(unreadable)?;
        let mut entries: Vec<DirectoryEntry> = Vec::new();

        while let Some(child) = read_dir.next_entry().await.map_err(unreadable)? {
            let child_path: PathBuf = child.path();

            match child.metadata().await {
                Ok(meta) => entries.push(DirectoryEntry::from_metadata(child_path, &meta)),

                // Entry vanished between readdir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!(path = %child_path.display(), "Skipping vanished entry");
                }

                Err(e) => return Err(unreadable(e)),
            }
        }

        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> Result<bool, AppError> {
        TokioFs::try_exists(path)
            .await
            .map_err(|e| AppError::io(path, e))
    }

    async fn entry(&self, path: &Path) -> Result<DirectoryEntry, AppError> {
        let meta = TokioFs::metadata(path)
            .await
            .map_err(|e| AppError::io(path, e))?;

        Ok(DirectoryEntry::from_metadata(path.to_path_buf(), &meta))
    }

    async fn mkdir(&self, path: &Path) -> Result<(), AppError> {
        TokioFs::create_dir_all(path)
            .await
            .map_err(|e| AppError::io(path, e))
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64, AppError> {
        TokioFs::copy(src, dst)
            .await
            .map_err(|e| AppError::io(src, e))
    }

    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), AppError> {
        match TokioFs::rename(src, dst).await {
            Ok(()) => Ok(()),

            Err(e) if e.raw_os_error() == Some(EXDEV) => {
                let meta = TokioFs::metadata(src)
                    .await
                    .map_err(|e| AppError::io(src, e))?;

                if meta.is_dir() {
                    return Err(AppError::io(src, e));
                }

                debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    "Rename crosses devices, falling back to copy + delete"
                );

                self.copy_file(src, dst).await?;
                self.delete_file(src).await
            }

            Err(e) => Err(AppError::io(src, e)),
        }
    }

    async fn delete_file(&self, path: &Path) -> Result<(), AppError> {
        TokioFs::remove_file(path)
            .await
            .map_err(|e| AppError::io(path, e))
    }

    async fn delete_directory_recursive(&self, path: &Path) -> Result<(), AppError> {
        TokioFs::remove_dir_all(path)
            .await
            .map_err(|e| AppError::io(path, e))
    }

    async fn remove_empty_dir(&self, path: &Path) -> Result<(), AppError> {
        TokioFs::remove_dir(path)
            .await
            .map_err(|e| AppError::io(path, e))
    }
}
