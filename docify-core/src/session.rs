//! ``src/session.rs``
//! ============================================================================
//! # `FileManager`: one browsing session over the storage root
//!
//! Owns navigation and selection, and shares the manifest handle and the
//! refresh signal with the lister and the operation engine. Hosts drive it
//! from UI events and re-list whenever the refresh generation moves.

use crate::config::Config;
use crate::error::AppError;
use crate::fs::dir_scanner::DirectoryLister;
use crate::fs::object_info::{DirectoryEntry, SortMode};
use crate::fs::path_utils;
use crate::fs::primitives::{FileSystem, LocalFileSystem};
use crate::model::nav_context::NavContext;
use crate::model::selection::{Press, Selection, SelectionMode, TapOutcome};
use crate::operators::file_operation_engine::FileOperationEngine;
use crate::operators::operation::{OperationKind, OperationOutcome, OperationRequest};
use anyhow::Context;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use trackr::{FilePersistence, Manifest};

pub struct FileManager {
    config: Config,
    manifest: Arc<Manifest>,
    lister: DirectoryLister,
    engine: FileOperationEngine,
    nav: NavContext,
    selection: Selection,
}

impl FileManager {
    /// Open a session on local disk with the manifest persisted where
    /// `config` says.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let root = config.resolved_root()?;
        let manifest_file = config.manifest_file()?;

        let persistence = FilePersistence::new(manifest_file.clone(), config.manifest.clone())
            .context("Failed to set up manifest persistence")?;
        persistence
            .cleanup()
            .await
            .context("Failed to clear an interrupted manifest save")?;

        let manifest = Manifest::open(Arc::new(persistence))
            .await
            .with_context(|| format!("Failed to load manifest: {}", manifest_file.display()))?;

        info!(
            root = %root.display(),
            manifest = %manifest_file.display(),
            tracked = manifest.len().await,
            "Session opened"
        );

        Ok(Self::from_parts(
            config,
            root,
            Arc::new(LocalFileSystem::new()),
            Arc::new(manifest),
        ))
    }

    /// Assemble a session from an explicit root, filesystem and manifest.
    pub fn from_parts(
        config: Config,
        root: impl AsRef<Path>,
        fs: Arc<dyn FileSystem>,
        manifest: Arc<Manifest>,
    ) -> Self {
        let nav = NavContext::new(root);
        let lister = DirectoryLister::new(fs.clone(), manifest.clone());
        let engine = FileOperationEngine::new(
            fs,
            manifest.clone(),
            nav.refresh().clone(),
            config.engine.clone(),
        );

        Self {
            config,
            manifest,
            lister,
            engine,
            nav,
            selection: Selection::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    #[must_use]
    pub fn nav(&self) -> &NavContext {
        &self.nav
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn current_dir(&self) -> &Path {
        self.nav.current()
    }

    /// Receiver that changes whenever listings may be stale.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.nav.subscribe()
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Visible entries of the current directory in the configured order.
    pub async fn listing(&self) -> Result<Vec<DirectoryEntry>, AppError> {
        self.listing_sorted(self.config.default_sort).await
    }

    pub async fn listing_sorted(&self, sort: SortMode) -> Result<Vec<DirectoryEntry>, AppError> {
        self.lister.list(self.nav.current(), sort).await
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn tap(&mut self, entry: &DirectoryEntry, press: Press) -> TapOutcome {
        self.selection.tap(entry, press)
    }

    pub fn select_all(&mut self, listed: &[DirectoryEntry]) -> SelectionMode {
        self.selection.select_all(listed)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn navigate_to(&mut self, path: impl AsRef<Path>) -> Result<(), AppError> {
        self.nav.navigate_to(path)?;
        self.selection.clear();
        Ok(())
    }

    /// Go up one level. Returns `false` at the root, leaving the selection as is.
    pub fn navigate_up(&mut self) -> bool {
        let moved = self.nav.navigate_up();
        if moved {
            self.selection.clear();
        }
        moved
    }

    /// Breadcrumb for the current directory, e.g. `Docify/Receipts`.
    #[must_use]
    pub fn display_path(&self) -> String {
        self.nav.display_path(&self.config.root_label)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Request over the current selection, targeting the current directory.
    #[must_use]
    pub fn request(&self, kind: OperationKind) -> OperationRequest {
        self.request_into(kind, self.nav.current())
    }

    /// Request over the current selection, targeting `destination`.
    #[must_use]
    pub fn request_into(&self, kind: OperationKind, destination: impl Into<PathBuf>) -> OperationRequest {
        OperationRequest::new(kind, self.selection.snapshot(), destination)
    }

    /// Suggested name for the create-folder prompt.
    #[must_use]
    pub fn suggested_folder_name(&self) -> String {
        path_utils::default_folder_name(Utc::now())
    }

    /// Name for a freshly captured image with the given extension.
    #[must_use]
    pub fn capture_file_name(&self, extension: &str) -> String {
        path_utils::capture_file_name(Utc::now(), extension)
    }

    /// Run `request`.
    ///
    /// A completed batch clears the selection. After a delete only the items
    /// that failed stay selected, and after a partial batch only the items
    /// not yet completed do. Other errors leave the selection untouched.
    #[instrument(level = "info", skip(self, request, cancel), fields(operation_type = request.kind.name()))]
    pub async fn execute(
        &mut self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationOutcome, AppError> {
        let outcome = match self.engine.execute(request, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let AppError::PartialBatch { completed, .. } = &e {
                    // Top-level items complete in request order
                    let done: Vec<&Path> = request
                        .items
                        .iter()
                        .take(completed.len())
                        .map(|item| item.path.as_path())
                        .collect();
                    self.selection.retain(|path| !done.contains(&path));
                }
                return Err(e);
            }
        };

        match &outcome {
            OperationOutcome::Batch(_) => self.selection.clear(),
            OperationOutcome::Delete(report) => {
                let failed: Vec<&Path> = report.failures().map(|o| o.path.as_path()).collect();
                self.selection.retain(|path| failed.contains(&path));
            }
        }

        Ok(outcome)
    }
}
