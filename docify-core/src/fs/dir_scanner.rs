//! ``src/fs/dir_scanner.rs``
//!
//! # `DirectoryLister`: tracked-aware directory listings
//!
//! Lists the children of a directory and hides files the manifest does not
//! know about. Directories are always shown so the user can navigate through
//! folders that only hold tracked files further down.

use crate::error::AppError;
use crate::fs::object_info::{DirectoryEntry, SortMode, sort_entries};
use crate::fs::primitives::FileSystem;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Span, debug, info, instrument};
use trackr::Manifest;

pub struct DirectoryLister {
    fs: Arc<dyn FileSystem>,
    manifest: Arc<Manifest>,
}

impl DirectoryLister {
    pub fn new(fs: Arc<dyn FileSystem>, manifest: Arc<Manifest>) -> Self {
        Self { fs, manifest }
    }

    /// Directories plus tracked files of `path`, sorted by `sort`.
    ///
    /// A missing `path` is created first, so listing a fresh root yields an
    /// empty listing rather than an error.
    #[instrument(
        level = "debug",
        skip(self),
        fields(path = %path.display(), sort = %sort, listed, hidden)
    )]
    pub async fn list(&self, path: &Path, sort: SortMode) -> Result<Vec<DirectoryEntry>, AppError> {
        let start_time = Instant::now();
        let all = self.read_bootstrapped(path).await?;
        let total = all.len();

        let mut visible: Vec<DirectoryEntry> = Vec::with_capacity(total);
        for entry in all {
            if entry.is_dir || self.manifest.is_tracked(&entry.path).await {
                visible.push(entry);
            }
        }

        sort_entries(&mut visible, sort);

        let span = Span::current();
        span.record("listed", visible.len());
        span.record("hidden", total - visible.len());

        debug!(
            listed = visible.len(),
            hidden = total - visible.len(),
            duration_us = start_time.elapsed().as_micros() as u64,
            "Directory listed"
        );

        Ok(visible)
    }

    /// Every child of `path`, tracked or not, sorted by `sort`.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub async fn list_all(
        &self,
        path: &Path,
        sort: SortMode,
    ) -> Result<Vec<DirectoryEntry>, AppError> {
        let mut entries = self.read_bootstrapped(path).await?;
        sort_entries(&mut entries, sort);

        debug!(listed = entries.len(), "Directory listed unfiltered");
        Ok(entries)
    }

    async fn read_bootstrapped(&self, path: &Path) -> Result<Vec<DirectoryEntry>, AppError> {
        if !self.fs.exists(path).await? {
            self.fs.mkdir(path).await?;
            info!(path = %path.display(), "Created missing directory");
        }

        self.fs.read_directory(path).await
    }
}
