//! ``src/operators/file_operation_engine.rs``
//! ============================================================================
//! # `FileOperationEngine`: multi-item copy, move, rename, create and delete
//!
//! Copy, move and rename pass an all-or-nothing validation gate before any
//! filesystem or manifest mutation. Once execution starts nothing is rolled
//! back: a mid-batch failure reports the items already completed. Delete is
//! best effort per item.
//!
//! Directory trees are walked with explicit work stacks. Within one directory
//! copy, sibling files are copied concurrently and tracked with a single
//! manifest flush.

use crate::config::EngineConfig;
use crate::error::AppError;
use crate::fs::object_info::DirectoryEntry;
use crate::fs::path_utils::{self, NameKind};
use crate::fs::primitives::FileSystem;
use crate::model::nav_context::RefreshSignal;
use crate::operators::operation::{
    BatchReport, DeleteReport, ItemOutcome, OperationKind, OperationOutcome, OperationRequest,
};
use futures::stream::{self, StreamExt};
use hashbrown::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};
use trackr::Manifest;

const FILE_URI_SCHEME: &str = "file://";

pub struct FileOperationEngine {
    fs: Arc<dyn FileSystem>,
    manifest: Arc<Manifest>,
    refresh: RefreshSignal,
    config: EngineConfig,
}

impl FileOperationEngine {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        manifest: Arc<Manifest>,
        refresh: RefreshSignal,
        config: EngineConfig,
    ) -> Self {
        Self {
            fs,
            manifest,
            refresh,
            config,
        }
    }

    /// Run `request`, dispatching on its kind.
    #[instrument(
        name = "file_operation_execute",
        level = "info",
        skip(self, request, cancel),
        fields(
            operation_type = request.kind.name(),
            items = request.items.len(),
            destination = %request.destination.display(),
        )
    )]
    pub async fn execute(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationOutcome, AppError> {
        let items = request.items.as_slice();
        let destination = request.destination.as_path();

        match &request.kind {
            OperationKind::Copy => self
                .copy(items, destination, cancel)
                .await
                .map(OperationOutcome::Batch),

            OperationKind::Move => self
                .move_items(items, destination, cancel)
                .await
                .map(OperationOutcome::Batch),

            OperationKind::Rename { new_name } => self
                .rename(items, new_name, cancel)
                .await
                .map(OperationOutcome::Batch),

            OperationKind::CreateFolder { name } => self
                .create_folder(destination, name, cancel)
                .await
                .map(OperationOutcome::Batch),

            OperationKind::Delete => Ok(OperationOutcome::Delete(
                self.delete(items, cancel).await,
            )),

            OperationKind::Import { source, name } => self
                .import(source, name.as_deref(), destination, cancel)
                .await
                .map(OperationOutcome::Batch),
        }
    }

    /// Copy every item into `destination`, tracking each copied file.
    #[instrument(
        level = "info",
        skip(self, items, destination, cancel),
        fields(
            destination = %destination.display(),
            items = items.len(),
            operation_id = tracing::field::Empty,
        )
    )]
    pub async fn copy(
        &self,
        items: &[DirectoryEntry],
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        self.preflight_transfer("copy", items, destination).await?;

        let start_time = Instant::now();
        let mut report = Self::start_report();

        for item in items {
            let target = path_utils::child(destination, &item.name);

            let result = if item.is_dir {
                self.copy_tree(&item.path, &target, cancel, &mut report)
                    .await
            } else {
                self.copy_single_file(item, &target, cancel, &mut report)
                    .await
            };

            if let Err(e) = result {
                return Err(self.fail(&item.path, report.completed, e));
            }

            report.completed.push(target);
        }

        Ok(self.finish("copy", report, start_time))
    }

    /// Move every item into `destination`, retargeting tracked paths.
    #[instrument(
        level = "info",
        skip(self, items, destination, cancel),
        fields(
            destination = %destination.display(),
            items = items.len(),
            operation_id = tracing::field::Empty,
        )
    )]
    pub async fn move_items(
        &self,
        items: &[DirectoryEntry],
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        self.preflight_transfer("move", items, destination).await?;

        let start_time = Instant::now();
        let mut report = Self::start_report();

        for item in items {
            let target = path_utils::child(destination, &item.name);

            let result = if item.is_dir {
                self.move_tree(&item.path, &target, cancel, &mut report)
                    .await
            } else {
                self.move_single_file(item, &target, cancel, &mut report)
                    .await
            };

            if let Err(e) = result {
                return Err(self.fail(&item.path, report.completed, e));
            }

            report.completed.push(target);
        }

        Ok(self.finish("move", report, start_time))
    }

    /// Rename a single entry in place.
    ///
    /// Files keep their original extension whatever the new name says.
    /// Directories are renamed atomically and every tracked path below them
    /// is retargeted with one manifest update.
    #[instrument(
        level = "info",
        skip(self, items, new_name, cancel),
        fields(new_name = %new_name, operation_id = tracing::field::Empty)
    )]
    pub async fn rename(
        &self,
        items: &[DirectoryEntry],
        new_name: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let [item] = items else {
            return Err(AppError::invalid_operation(format!(
                "Rename works on exactly one item, {} selected",
                items.len()
            )));
        };

        let final_name = if item.is_dir {
            path_utils::validate_name(new_name, NameKind::Folder)?
        } else {
            let validated = path_utils::validate_name(new_name, NameKind::File)?;
            path_utils::preserve_extension(&item.name, &validated)
        };

        let parent = path_utils::parent(&item.path)
            .ok_or_else(|| AppError::invalid_operation("Cannot rename the filesystem root"))?;
        let target = path_utils::child(&parent, &final_name);

        if self.fs.exists(&target).await? {
            return Err(AppError::name_conflict(final_name, parent));
        }

        let start_time = Instant::now();
        let mut report = Self::start_report();

        let result = async {
            checkpoint(cancel)?;
            self.fs.move_file(&item.path, &target).await?;

            if item.is_dir {
                let moved = self.manifest.retarget_prefix(&item.path, &target).await?;
                report.files += moved;
            } else {
                self.manifest.retarget(&item.path, &target).await?;
                report.files += 1;
                report.bytes += item.size;
            }

            Ok::<(), AppError>(())
        }
        .await;

        if let Err(e) = result {
            return Err(self.fail(&item.path, Vec::new(), e));
        }

        debug!(from = %item.path.display(), to = %target.display(), "Renamed");
        report.completed.push(target);
        Ok(self.finish("rename", report, start_time))
    }

    /// Create an empty folder named `name` in `destination`.
    #[instrument(
        level = "info",
        skip(self, destination, cancel),
        fields(destination = %destination.display(), operation_id = tracing::field::Empty)
    )]
    pub async fn create_folder(
        &self,
        destination: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let name = path_utils::validate_name(name, NameKind::Folder)?;
        let target = path_utils::child(destination, &name);

        if self.fs.exists(&target).await? {
            return Err(AppError::name_conflict(name, destination));
        }

        let start_time = Instant::now();
        let mut report = Self::start_report();

        let result = async {
            checkpoint(cancel)?;
            self.fs.mkdir(&target).await
        }
        .await;

        if let Err(e) = result {
            return Err(self.fail(&target, Vec::new(), e));
        }

        report.completed.push(target);
        Ok(self.finish("create_folder", report, start_time))
    }

    /// Copy an external file into `destination` and track it.
    ///
    /// `source` may carry a `file://` prefix. A given `name` keeps the source
    /// file's extension; without one the source file name is used.
    #[instrument(
        level = "info",
        skip(self, source, destination, cancel),
        fields(
            source = %source.display(),
            destination = %destination.display(),
            operation_id = tracing::field::Empty,
        )
    )]
    pub async fn import(
        &self,
        source: &Path,
        name: Option<&str>,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let source = strip_file_uri(source);
        let source_entry = self.fs.entry(&source).await?;

        if source_entry.is_dir {
            return Err(AppError::invalid_operation(format!(
                "Only files can be imported: {}",
                source.display()
            )));
        }

        let final_name = match name {
            Some(requested) => {
                let validated = path_utils::validate_name(requested, NameKind::File)?;
                path_utils::preserve_extension(&source_entry.name, &validated)
            }
            None => path_utils::validate_name(&source_entry.name, NameKind::File)?,
        };

        let target = path_utils::child(destination, &final_name);
        if self.fs.exists(&target).await? {
            return Err(AppError::name_conflict(final_name, destination));
        }

        let start_time = Instant::now();
        let mut report = Self::start_report();

        let result = async {
            checkpoint(cancel)?;
            self.fs.mkdir(destination).await?;
            self.copy_single_file(&source_entry, &target, cancel, &mut report)
                .await
        }
        .await;

        if let Err(e) = result {
            return Err(self.fail(&source, Vec::new(), e));
        }

        report.completed.push(target);
        Ok(self.finish("import", report, start_time))
    }

    /// Delete every item, continuing past failures.
    ///
    /// Directories are removed recursively and every tracked path below them
    /// is untracked. Items not reached before cancellation are reported as
    /// `Cancelled`.
    #[instrument(
        level = "info",
        skip(self, items, cancel),
        fields(items = items.len(), failed, operation_id = tracing::field::Empty)
    )]
    pub async fn delete(&self, items: &[DirectoryEntry], cancel: &CancellationToken) -> DeleteReport {
        let start_time = Instant::now();
        let mut report = DeleteReport {
            operation_id: Self::start_report().operation_id,
            ..DeleteReport::default()
        };

        for item in items {
            let result = match checkpoint(cancel) {
                Ok(()) => self.delete_one(item).await,
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                warn!(path = %item.path.display(), error = %e, "Delete failed, continuing");
            }

            report.outcomes.push(ItemOutcome {
                path: item.path.clone(),
                result,
            });
        }

        report.duration = start_time.elapsed();
        let failed = report.failures().count();
        Span::current().record("failed", failed);

        if report.deleted().next().is_some() {
            self.refresh.invalidate();
        }

        info!(
            operation_id = %report.operation_id,
            deleted = items.len() - failed,
            failed,
            duration_ms = report.duration.as_millis() as u64,
            "Delete completed"
        );

        report
    }

    // ------------------------------------------------------------------
    // Validation gate
    // ------------------------------------------------------------------

    /// Reject the whole batch before touching anything.
    async fn preflight_transfer(
        &self,
        op: &'static str,
        items: &[DirectoryEntry],
        destination: &Path,
    ) -> Result<(), AppError> {
        if items.is_empty() {
            return Err(AppError::invalid_operation(format!("Nothing to {op}")));
        }

        for item in items {
            if item.is_dir && path_utils::is_same_or_ancestor(&item.path, destination) {
                return Err(AppError::invalid_operation(format!(
                    "Cannot {op} a folder into itself or its subfolder: \"{}\"",
                    item.name
                )));
            }
        }

        // Two items landing on the same name would overwrite each other
        let mut names: HashSet<&str> = HashSet::with_capacity(items.len());
        for item in items {
            let target = path_utils::child(destination, &item.name);
            if !names.insert(item.name.as_str()) || self.fs.exists(&target).await? {
                return Err(AppError::name_conflict(item.name.as_str(), destination));
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Copy
    // ------------------------------------------------------------------

    async fn copy_single_file(
        &self,
        item: &DirectoryEntry,
        target: &Path,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> Result<(), AppError> {
        checkpoint(cancel)?;

        let bytes = self.fs.copy_file(&item.path, target).await?;
        self.manifest.track(target).await?;

        report.files += 1;
        report.bytes += bytes;
        Ok(())
    }

    async fn copy_tree(
        &self,
        src_root: &Path,
        dst_root: &Path,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> Result<(), AppError> {
        let mut stack: Vec<(PathBuf, PathBuf)> = vec![(src_root.to_path_buf(), dst_root.to_path_buf())];

        while let Some((src_dir, dst_dir)) = stack.pop() {
            checkpoint(cancel)?;
            self.fs.mkdir(&dst_dir).await?;

            let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();
            for entry in self.fs.read_directory(&src_dir).await? {
                let target = path_utils::child(&dst_dir, &entry.name);

                if entry.is_dir {
                    stack.push((entry.path, target));
                } else {
                    files.push((entry.path, target));
                }
            }

            self.copy_siblings(files, cancel, report).await?;
        }

        Ok(())
    }

    /// Copy files of one directory concurrently, then track every copy that
    /// landed before reporting the first failure.
    async fn copy_siblings(
        &self,
        files: Vec<(PathBuf, PathBuf)>,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> Result<(), AppError> {
        if files.is_empty() {
            return Ok(());
        }

        let results: Vec<Result<(PathBuf, u64), AppError>> = stream::iter(files)
            .map(move |(src, dst)| async move {
                checkpoint(cancel)?;
                let bytes = self.fs.copy_file(&src, &dst).await?;
                Ok::<_, AppError>((dst, bytes))
            })
            .buffer_unordered(self.config.copy_concurrency.max(1))
            .collect()
            .await;

        let mut copied: Vec<PathBuf> = Vec::with_capacity(results.len());
        let mut first_error: Option<AppError> = None;

        for result in results {
            match result {
                Ok((dst, bytes)) => {
                    report.bytes += bytes;
                    copied.push(dst);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        report.files += copied.len();
        self.manifest.track_all(&copied).await?;

        first_error.map_or(Ok(()), Err)
    }

    // ------------------------------------------------------------------
    // Move
    // ------------------------------------------------------------------

    async fn move_single_file(
        &self,
        item: &DirectoryEntry,
        target: &Path,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> Result<(), AppError> {
        checkpoint(cancel)?;

        self.fs.move_file(&item.path, target).await?;
        self.manifest.retarget(&item.path, target).await?;

        report.files += 1;
        report.bytes += item.size;
        Ok(())
    }

    /// Move a directory child by child, then remove the emptied source tree.
    async fn move_tree(
        &self,
        src_root: &Path,
        dst_root: &Path,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> Result<(), AppError> {
        let mut stack: Vec<(PathBuf, PathBuf)> = vec![(src_root.to_path_buf(), dst_root.to_path_buf())];
        let mut emptied: Vec<PathBuf> = Vec::new();

        while let Some((src_dir, dst_dir)) = stack.pop() {
            checkpoint(cancel)?;
            self.fs.mkdir(&dst_dir).await?;

            let children = self.fs.read_directory(&src_dir).await?;
            emptied.push(src_dir);

            let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
            let mut outcome: Result<(), AppError> = Ok(());

            for entry in children {
                let target = path_utils::child(&dst_dir, &entry.name);

                if entry.is_dir {
                    stack.push((entry.path, target));
                    continue;
                }

                let step = match checkpoint(cancel) {
                    Ok(()) => self.fs.move_file(&entry.path, &target).await,
                    Err(e) => Err(e),
                };

                if let Err(e) = step {
                    outcome = Err(e);
                    break;
                }

                report.files += 1;
                report.bytes += entry.size;
                moved.push((entry.path, target));
            }

            // Files already moved are retargeted even when a sibling failed
            self.manifest.retarget_many(moved).await?;
            outcome?;
        }

        // Parents were pushed before their children
        for dir in emptied.iter().rev() {
            self.fs.remove_empty_dir(dir).await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    async fn delete_one(&self, item: &DirectoryEntry) -> Result<(), AppError> {
        if item.is_dir {
            self.fs.delete_directory_recursive(&item.path).await?;
            let untracked = self.manifest.untrack_prefix(&item.path).await?;
            debug!(path = %item.path.display(), untracked, "Directory deleted");
        } else {
            self.fs.delete_file(&item.path).await?;
            self.manifest.untrack(&item.path).await?;
            debug!(path = %item.path.display(), "File deleted");
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    fn start_report() -> BatchReport {
        let operation_id = nanoid::nanoid!();
        Span::current().record("operation_id", tracing::field::display(&operation_id));

        BatchReport {
            operation_id,
            ..BatchReport::default()
        }
    }

    fn finish(&self, op: &'static str, mut report: BatchReport, start_time: Instant) -> BatchReport {
        report.duration = start_time.elapsed();
        self.refresh.invalidate();

        if report.duration > self.config.slow_operation_threshold {
            warn!(
                operation_id = %report.operation_id,
                operation_type = op,
                duration_ms = report.duration.as_millis() as u64,
                "Slow file operation"
            );
        }

        info!(
            operation_id = %report.operation_id,
            operation_type = op,
            items = report.completed.len(),
            files = report.files,
            bytes = %report.bytes_display(),
            duration_ms = report.duration.as_millis() as u64,
            "File operation completed"
        );

        report
    }

    /// Map an execution failure to the caller-facing error.
    ///
    /// Work already done stays in place, so listings are invalidated either way.
    fn fail(&self, failed: &Path, completed: Vec<PathBuf>, error: AppError) -> AppError {
        self.refresh.invalidate();

        if matches!(error, AppError::Cancelled) {
            warn!(path = %failed.display(), completed = completed.len(), "File operation cancelled");
            return AppError::Cancelled;
        }

        warn!(
            path = %failed.display(),
            completed = completed.len(),
            error = %error,
            "File operation failed mid-batch"
        );
        AppError::partial_batch(failed, completed, error)
    }
}

#[inline]
fn checkpoint(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

fn strip_file_uri(source: &Path) -> PathBuf {
    source
        .to_str()
        .and_then(|s| s.strip_prefix(FILE_URI_SCHEME))
        .map_or_else(|| source.to_path_buf(), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::fs::primitives::LocalFileSystem;
    use async_trait::async_trait;
    use std::io;
    use tempfile::TempDir;
    use tokio::fs as TokioFs;

    /// Delegates to the local disk but fails chosen paths.
    #[derive(Default)]
    struct FaultyFs {
        inner: LocalFileSystem,
        fail_delete: Option<PathBuf>,
        fail_copy: Option<PathBuf>,
    }

    fn denied(path: &Path) -> AppError {
        AppError::io(path, io::Error::from(io::ErrorKind::PermissionDenied))
    }

    #[async_trait]
    impl FileSystem for FaultyFs {
        async fn read_directory(&self, dir: &Path) -> Result<Vec<DirectoryEntry>, AppError> {
            self.inner.read_directory(dir).await
        }

        async fn exists(&self, path: &Path) -> Result<bool, AppError> {
            self.inner.exists(path).await
        }

        async fn entry(&self, path: &Path) -> Result<DirectoryEntry, AppError> {
            self.inner.entry(path).await
        }

        async fn mkdir(&self, path: &Path) -> Result<(), AppError> {
            self.inner.mkdir(path).await
        }

        async fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64, AppError> {
            if self.fail_copy.as_deref() == Some(src) {
                return Err(denied(src));
            }
            self.inner.copy_file(src, dst).await
        }

        async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), AppError> {
            self.inner.move_file(src, dst).await
        }

        async fn delete_file(&self, path: &Path) -> Result<(), AppError> {
            if self.fail_delete.as_deref() == Some(path) {
                return Err(denied(path));
            }
            self.inner.delete_file(path).await
        }

        async fn delete_directory_recursive(&self, path: &Path) -> Result<(), AppError> {
            self.inner.delete_directory_recursive(path).await
        }

        async fn remove_empty_dir(&self, path: &Path) -> Result<(), AppError> {
            self.inner.remove_empty_dir(path).await
        }
    }

    struct Fixture {
        temp_dir: TempDir,
        manifest: Arc<Manifest>,
        refresh: RefreshSignal,
        engine: FileOperationEngine,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_fs(Arc::new(LocalFileSystem::new()))
        }

        fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let manifest = Arc::new(Manifest::in_memory());
            let refresh = RefreshSignal::new();
            let engine = FileOperationEngine::new(
                fs,
                manifest.clone(),
                refresh.clone(),
                EngineConfig::default(),
            );

            Self {
                temp_dir,
                manifest,
                refresh,
                engine,
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp_dir.path().join(rel)
        }

        /// Write a file and track it.
        async fn tracked(&self, rel: &str, contents: &str) -> DirectoryEntry {
            let path = self.path(rel);
            if let Some(parent) = path.parent() {
                TokioFs::create_dir_all(parent).await.unwrap();
            }
            TokioFs::write(&path, contents).await.unwrap();
            self.manifest.track(&path).await.unwrap();
            LocalFileSystem::new().entry(&path).await.unwrap()
        }

        async fn dir(&self, rel: &str) -> DirectoryEntry {
            let path = self.path(rel);
            TokioFs::create_dir_all(&path).await.unwrap();
            LocalFileSystem::new().entry(&path).await.unwrap()
        }

        async fn is_tracked(&self, rel: &str) -> bool {
            self.manifest.is_tracked(self.path(rel)).await
        }
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_copy_file_is_pure_addition() {
        let fx = Fixture::new();
        let a = fx.tracked("a.txt", "alpha").await;
        fx.dir("sub").await;

        let report = fx.engine.copy(&[a], &fx.path("sub"), &token()).await.unwrap();

        assert_eq!(report.completed, vec![fx.path("sub/a.txt")]);
        assert_eq!(report.bytes, 5);
        assert!(fx.is_tracked("a.txt").await);
        assert!(fx.is_tracked("sub/a.txt").await);
        assert!(fx.path("a.txt").exists());
        assert_eq!(fx.refresh.generation(), 1);
    }

    #[tokio::test]
    async fn test_copy_directory_tracks_every_copied_file() {
        let fx = Fixture::new();
        fx.tracked("docs/x.txt", "x").await;
        fx.tracked("docs/inner/y.txt", "yy").await;
        fx.tracked("docs/inner/deep/z.txt", "zzz").await;
        let docs = fx.dir("docs").await;
        fx.dir("backup").await;

        let report = fx
            .engine
            .copy(&[docs], &fx.path("backup"), &token())
            .await
            .unwrap();

        assert_eq!(report.files, 3);
        assert_eq!(report.bytes, 6);
        for rel in ["x.txt", "inner/y.txt", "inner/deep/z.txt"] {
            assert!(fx.is_tracked(&format!("backup/docs/{rel}")).await, "{rel}");
            assert!(fx.is_tracked(&format!("docs/{rel}")).await, "{rel}");
        }
        assert_eq!(fx.manifest.len().await, 6);
    }

    #[tokio::test]
    async fn test_transfer_into_own_subtree_is_rejected() {
        let fx = Fixture::new();
        fx.tracked("docs/inner/y.txt", "y").await;
        let docs = fx.dir("docs").await;

        let into_child = fx
            .engine
            .copy(&[docs.clone()], &fx.path("docs/inner"), &token())
            .await
            .unwrap_err();
        assert!(matches!(into_child, AppError::InvalidOperation { .. }));

        let into_self = fx
            .engine
            .move_items(&[docs], &fx.path("docs"), &token())
            .await
            .unwrap_err();
        assert!(matches!(into_self, AppError::InvalidOperation { .. }));

        assert!(!fx.path("docs/inner/docs").exists());
        assert_eq!(fx.manifest.len().await, 1);
        assert_eq!(fx.refresh.generation(), 0);
    }

    #[tokio::test]
    async fn test_sibling_with_shared_prefix_is_not_a_descendant() {
        let fx = Fixture::new();
        fx.tracked("docs/a.txt", "a").await;
        let docs = fx.dir("docs").await;
        fx.dir("docs2").await;

        fx.engine
            .copy(&[docs], &fx.path("docs2"), &token())
            .await
            .unwrap();

        assert!(fx.is_tracked("docs2/docs/a.txt").await);
    }

    #[tokio::test]
    async fn test_name_conflict_rejects_whole_batch() {
        let fx = Fixture::new();
        let a = fx.tracked("a.txt", "a").await;
        let b = fx.tracked("b.txt", "b").await;
        fx.dir("dest").await;
        TokioFs::write(fx.path("dest/b.txt"), "other").await.unwrap();

        let err = fx
            .engine
            .copy(&[a, b], &fx.path("dest"), &token())
            .await
            .unwrap_err();

        match err {
            AppError::NameConflict { name, destination } => {
                assert_eq!(name, "b.txt");
                assert_eq!(destination, fx.path("dest"));
            }
            other => panic!("expected NameConflict, got {other:?}"),
        }
        assert!(!fx.path("dest/a.txt").exists());
        assert_eq!(fx.manifest.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_names_in_batch_are_rejected() {
        let fx = Fixture::new();
        let first = fx.tracked("x/a.txt", "FIRST").await;
        let second = fx.tracked("y/a.txt", "SECOND").await;
        fx.dir("dest").await;
        let batch = [first.clone(), second];

        let copied = fx
            .engine
            .copy(&batch, &fx.path("dest"), &token())
            .await
            .unwrap_err();
        assert!(matches!(copied, AppError::NameConflict { ref name, .. } if name == "a.txt"));

        let moved = fx
            .engine
            .move_items(&batch, &fx.path("dest"), &token())
            .await
            .unwrap_err();
        assert!(matches!(moved, AppError::NameConflict { .. }));

        let repeated = fx
            .engine
            .move_items(&[first.clone(), first], &fx.path("dest"), &token())
            .await
            .unwrap_err();
        assert!(matches!(repeated, AppError::NameConflict { .. }));

        assert!(!fx.path("dest/a.txt").exists());
        assert_eq!(std::fs::read_to_string(fx.path("x/a.txt")).unwrap(), "FIRST");
        assert_eq!(std::fs::read_to_string(fx.path("y/a.txt")).unwrap(), "SECOND");
        assert_eq!(fx.manifest.len().await, 2);
        assert_eq!(fx.refresh.generation(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid() {
        let fx = Fixture::new();

        let err = fx
            .engine
            .copy(&[], fx.temp_dir.path(), &token())
            .await
            .unwrap_err();

        assert!(err.is_preflight());
    }

    #[tokio::test]
    async fn test_move_file_substitutes_path() {
        let fx = Fixture::new();
        let a = fx.tracked("a.txt", "a").await;
        fx.dir("sub").await;

        fx.engine
            .move_items(&[a], &fx.path("sub"), &token())
            .await
            .unwrap();

        assert!(!fx.is_tracked("a.txt").await);
        assert!(fx.is_tracked("sub/a.txt").await);
        assert!(!fx.path("a.txt").exists());
        assert_eq!(fx.manifest.len().await, 1);
    }

    #[tokio::test]
    async fn test_move_directory_retargets_descendants() {
        let fx = Fixture::new();
        fx.tracked("docs/x.txt", "x").await;
        fx.tracked("docs/inner/y.txt", "y").await;
        fx.dir("docs/empty").await;
        let docs = fx.dir("docs").await;
        fx.dir("archive").await;

        let report = fx
            .engine
            .move_items(&[docs], &fx.path("archive"), &token())
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        assert!(!fx.path("docs").exists());
        assert!(fx.path("archive/docs/empty").is_dir());
        assert!(fx.is_tracked("archive/docs/x.txt").await);
        assert!(fx.is_tracked("archive/docs/inner/y.txt").await);
        assert!(fx.manifest.tracked_under(fx.path("docs")).await.is_empty());
    }

    #[tokio::test]
    async fn test_rename_preserves_extension() {
        let fx = Fixture::new();
        let report_txt = fx.tracked("report.txt", "r").await;

        let report = fx
            .engine
            .rename(&[report_txt], "summary.pdf", &token())
            .await
            .unwrap();
        assert_eq!(report.completed, vec![fx.path("summary.txt")]);

        let summary = LocalFileSystem::new().entry(&fx.path("summary.txt")).await.unwrap();
        fx.engine
            .rename(&[summary], "  final  ", &token())
            .await
            .unwrap();

        assert!(fx.path("final.txt").exists());
        assert!(fx.is_tracked("final.txt").await);
        assert!(!fx.is_tracked("report.txt").await);
        assert!(!fx.is_tracked("summary.txt").await);
    }

    #[tokio::test]
    async fn test_rename_directory_retargets_prefix() {
        let fx = Fixture::new();
        fx.tracked("old/a.txt", "a").await;
        fx.tracked("old/sub/b.txt", "b").await;
        let old = fx.dir("old").await;

        let report = fx.engine.rename(&[old], "new", &token()).await.unwrap();

        assert_eq!(report.files, 2);
        assert!(fx.is_tracked("new/a.txt").await);
        assert!(fx.is_tracked("new/sub/b.txt").await);
        assert!(!fx.is_tracked("old/a.txt").await);
    }

    #[tokio::test]
    async fn test_rename_rejections() {
        let fx = Fixture::new();
        let a = fx.tracked("a.txt", "a").await;
        let b = fx.tracked("b.txt", "b").await;
        let dir = fx.dir("docs").await;

        let two = fx
            .engine
            .rename(&[a.clone(), b], "c", &token())
            .await
            .unwrap_err();
        assert!(matches!(two, AppError::InvalidOperation { .. }));

        let illegal = fx.engine.rename(&[a.clone()], "a/b", &token()).await.unwrap_err();
        assert!(matches!(
            illegal,
            AppError::Validation(ValidationError::IllegalCharacter { found: '/' })
        ));

        let dotted = fx.engine.rename(&[dir], "v1.2", &token()).await.unwrap_err();
        assert!(matches!(
            dotted,
            AppError::Validation(ValidationError::DotInFolderName)
        ));

        let conflict = fx.engine.rename(&[a], "b", &token()).await.unwrap_err();
        assert!(matches!(conflict, AppError::NameConflict { .. }));

        assert!(fx.is_tracked("a.txt").await);
        assert_eq!(fx.refresh.generation(), 0);
    }

    #[tokio::test]
    async fn test_create_folder() {
        let fx = Fixture::new();
        let root = fx.temp_dir.path();

        fx.engine
            .create_folder(root, " Receipts ", &token())
            .await
            .unwrap();
        assert!(fx.path("Receipts").is_dir());
        assert!(fx.manifest.is_empty().await);

        let again = fx
            .engine
            .create_folder(root, "Receipts", &token())
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::NameConflict { .. }));

        let dotted = fx
            .engine
            .create_folder(root, "a.b", &token())
            .await
            .unwrap_err();
        assert!(matches!(dotted, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_continues_past_failed_item() {
        let temp_dir = TempDir::new().unwrap();
        let second = temp_dir.path().join("2.txt");
        let faulty = FaultyFs {
            fail_delete: Some(second.clone()),
            ..FaultyFs::default()
        };

        let mut fx = Fixture::with_fs(Arc::new(faulty));
        fx.temp_dir = temp_dir;

        let items = vec![
            fx.tracked("1.txt", "1").await,
            fx.tracked("2.txt", "2").await,
            fx.tracked("3.txt", "3").await,
        ];

        let report = fx.engine.delete(&items, &token()).await;

        assert!(!fx.path("1.txt").exists());
        assert!(fx.path("2.txt").exists());
        assert!(!fx.path("3.txt").exists());
        assert!(!fx.is_tracked("1.txt").await);
        assert!(fx.is_tracked("2.txt").await);
        assert!(!fx.is_tracked("3.txt").await);

        match report.into_result() {
            Err(AppError::DeleteFailed { failed }) => assert_eq!(failed, vec![second]),
            other => panic!("expected DeleteFailed, got {other:?}"),
        }
        assert_eq!(fx.refresh.generation(), 1);
    }

    #[tokio::test]
    async fn test_delete_directory_untracks_descendants() {
        let fx = Fixture::new();
        fx.tracked("docs/a.txt", "a").await;
        fx.tracked("docs/sub/b.txt", "b").await;
        fx.tracked("keep.txt", "k").await;
        let docs = fx.dir("docs").await;

        let report = fx.engine.delete(&[docs], &token()).await;

        assert!(report.is_success());
        assert!(!fx.path("docs").exists());
        assert_eq!(fx.manifest.len().await, 1);
        assert!(fx.is_tracked("keep.txt").await);
    }

    #[tokio::test]
    async fn test_mid_batch_failure_reports_completed_items() {
        let temp_dir = TempDir::new().unwrap();
        let faulty = FaultyFs {
            fail_copy: Some(temp_dir.path().join("b.txt")),
            ..FaultyFs::default()
        };

        let mut fx = Fixture::with_fs(Arc::new(faulty));
        fx.temp_dir = temp_dir;

        let a = fx.tracked("a.txt", "a").await;
        let b = fx.tracked("b.txt", "b").await;
        let c = fx.tracked("c.txt", "c").await;
        fx.dir("dest").await;

        let err = fx
            .engine
            .copy(&[a, b, c], &fx.path("dest"), &token())
            .await
            .unwrap_err();

        match &err {
            AppError::PartialBatch {
                failed, completed, ..
            } => {
                assert_eq!(failed, &fx.path("b.txt"));
                assert_eq!(completed, &vec![fx.path("dest/a.txt")]);
            }
            other => panic!("expected PartialBatch, got {other:?}"),
        }
        assert_eq!(err.io_kind(), Some(io::ErrorKind::PermissionDenied));
        assert!(fx.is_tracked("dest/a.txt").await);
        assert!(!fx.path("dest/c.txt").exists());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_mutation() {
        let fx = Fixture::new();
        let a = fx.tracked("a.txt", "a").await;
        fx.dir("dest").await;

        let cancel = token();
        cancel.cancel();

        let err = fx
            .engine
            .copy(&[a.clone()], &fx.path("dest"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(!fx.path("dest/a.txt").exists());

        let report = fx.engine.delete(&[a], &cancel).await;
        assert!(matches!(
            report.outcomes[0].result,
            Err(AppError::Cancelled)
        ));
        assert!(fx.path("a.txt").exists());
    }

    #[tokio::test]
    async fn test_import_external_file() {
        let fx = Fixture::new();
        let outside = TempDir::new().unwrap();
        let capture = outside.path().join("photo.jpg");
        TokioFs::write(&capture, "jpeg").await.unwrap();
        let inbox = fx.path("inbox");

        let uri = PathBuf::from(format!("file://{}", capture.display()));
        let report = fx
            .engine
            .import(&uri, Some("receipt"), &inbox, &token())
            .await
            .unwrap();
        assert_eq!(report.completed, vec![fx.path("inbox/receipt.jpg")]);
        assert!(fx.is_tracked("inbox/receipt.jpg").await);

        fx.engine
            .import(&capture, None, &inbox, &token())
            .await
            .unwrap();
        assert!(fx.is_tracked("inbox/photo.jpg").await);

        let again = fx
            .engine
            .import(&capture, None, &inbox, &token())
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::NameConflict { .. }));
        assert!(capture.exists());
    }

    #[tokio::test]
    async fn test_execute_dispatches_on_kind() {
        let fx = Fixture::new();
        let root = fx.temp_dir.path().to_path_buf();

        let created = fx
            .engine
            .execute(&OperationRequest::create_folder("Inbox", &root), &token())
            .await
            .unwrap();
        assert!(matches!(created, OperationOutcome::Batch(_)));

        let inbox = LocalFileSystem::new().entry(&fx.path("Inbox")).await.unwrap();
        let deleted = fx
            .engine
            .execute(
                &OperationRequest::new(OperationKind::Delete, vec![inbox], &root),
                &token(),
            )
            .await
            .unwrap();

        assert!(deleted.is_success());
        assert!(!fx.path("Inbox").exists());
        assert_eq!(fx.refresh.generation(), 2);
    }
}
