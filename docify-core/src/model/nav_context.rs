//! ``src/model/nav_context.rs``
//! ============================================================================
//! # `NavContext`: current directory within a fixed root
//!
//! Holds the storage root and the directory being viewed, plus the refresh
//! signal listeners watch to know a listing is stale. Navigation never leaves
//! the root.

use crate::error::AppError;
use crate::fs::path_utils;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Generation counter bumped whenever listings may be stale.
///
/// Cloned handles share the same counter; the operation engine holds one and
/// bumps it after every successful mutation.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl RefreshSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Bump the generation and wake subscribers. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.tx.send_modify(|generation| *generation += 1);
        let generation = *self.tx.borrow();

        debug!(generation, "Listings invalidated");
        generation
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct NavContext {
    root: PathBuf,
    current: PathBuf,
    refresh: RefreshSignal,
}

impl NavContext {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = path_utils::normalize(root.as_ref());

        Self {
            current: root.clone(),
            root,
            refresh: RefreshSignal::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn current(&self) -> &Path {
        &self.current
    }

    #[must_use]
    pub fn is_at_root(&self) -> bool {
        self.current == self.root
    }

    /// Move to `path`; relative paths resolve against the current directory.
    pub fn navigate_to(&mut self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let target = path_utils::normalize(&self.current.join(path.as_ref()));

        if !path_utils::is_same_or_ancestor(&self.root, &target) {
            return Err(AppError::invalid_operation(format!(
                "{} is outside {}",
                target.display(),
                self.root.display()
            )));
        }

        debug!(from = %self.current.display(), to = %target.display(), "Navigate");
        self.current = target;
        Ok(())
    }

    /// Go to the parent directory. Returns `false` when already at the root.
    pub fn navigate_up(&mut self) -> bool {
        if self.is_at_root() {
            return false;
        }

        match path_utils::parent(&self.current) {
            Some(parent) if path_utils::is_same_or_ancestor(&self.root, &parent) => {
                self.current = parent;
            }
            _ => self.current = self.root.clone(),
        }

        true
    }

    /// Current directory with the root prefix replaced by `label`,
    /// e.g. `Docify/Receipts/2024`.
    #[must_use]
    pub fn display_path(&self, label: &str) -> String {
        let relative = self.current.strip_prefix(&self.root).unwrap_or(Path::new(""));

        let mut out = String::from(label);
        for component in relative.components() {
            out.push('/');
            out.push_str(&component.as_os_str().to_string_lossy());
        }

        out
    }

    #[must_use]
    pub fn refresh(&self) -> &RefreshSignal {
        &self.refresh
    }

    pub fn invalidate(&self) -> u64 {
        self.refresh.invalidate()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }
}
