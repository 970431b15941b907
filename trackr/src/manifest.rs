//! The tracked-file manifest store
//!
//! A single shared set of absolute file paths that the application created or
//! imported. Every effective mutation is flushed to the persistence backend
//! before it becomes visible; the write lock is held across the flush so
//! concurrent readers never see a half-applied update and concurrent writers
//! never lose one.

use crate::error::{ManifestError, ManifestResult};
use crate::persistence::{ManifestPersistence, MemoryPersistence};
use crate::TrackedSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

pub struct Manifest {
    paths: RwLock<TrackedSet>,
    persistence: Arc<dyn ManifestPersistence>,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest").finish_non_exhaustive()
    }
}

impl Manifest {
    /// Load the persisted state once and wrap it in a store
    pub async fn open(persistence: Arc<dyn ManifestPersistence>) -> ManifestResult<Self> {
        let loaded = persistence.load().await?;
        let paths: TrackedSet = loaded.iter().map(|p| clean(p)).collect();

        debug!(tracked = paths.len(), "Manifest opened");

        Ok(Self {
            paths: RwLock::new(paths),
            persistence,
        })
    }

    /// Empty store backed by memory only
    pub fn in_memory() -> Self {
        Self {
            paths: RwLock::new(TrackedSet::new()),
            persistence: Arc::new(MemoryPersistence::new()),
        }
    }

    pub async fn is_tracked(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.is_absolute() {
            return false;
        }

        self.paths.read().await.contains(&clean(path))
    }

    /// Idempotently add `path`
    pub async fn track(&self, path: impl AsRef<Path>) -> ManifestResult<()> {
        let key = key(path.as_ref())?;

        self.mutate("track", move |set| usize::from(set.insert(key)))
            .await
            .map(|_| ())
    }

    /// Idempotently remove `path`
    pub async fn untrack(&self, path: impl AsRef<Path>) -> ManifestResult<()> {
        let key = key(path.as_ref())?;

        self.mutate("untrack", move |set| usize::from(set.remove(&key)))
            .await
            .map(|_| ())
    }

    /// Replace `old` with `new` as one visible update
    pub async fn retarget(
        &self,
        old: impl AsRef<Path>,
        new: impl AsRef<Path>,
    ) -> ManifestResult<()> {
        let old = key(old.as_ref())?;
        let new = key(new.as_ref())?;

        self.mutate("retarget", move |set| retarget_in(set, &old, new))
            .await
            .map(|_| ())
    }

    /// Add every path with a single flush
    pub async fn track_all<I, P>(&self, paths: I) -> ManifestResult<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let keys = paths
            .into_iter()
            .map(|p| key(p.as_ref()))
            .collect::<ManifestResult<Vec<PathBuf>>>()?;

        self.mutate("track_all", move |set| {
            keys.into_iter().filter(|k| set.insert(k.clone())).count()
        })
        .await
    }

    /// Apply several retargets with a single flush
    pub async fn retarget_many<I, A, B>(&self, pairs: I) -> ManifestResult<usize>
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<Path>,
        B: AsRef<Path>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(a, b)| -> ManifestResult<(PathBuf, PathBuf)> {
                Ok((key(a.as_ref())?, key(b.as_ref())?))
            })
            .collect::<ManifestResult<Vec<(PathBuf, PathBuf)>>>()?;

        self.mutate("retarget_many", move |set| {
            pairs
                .into_iter()
                .map(|(old, new)| retarget_in(set, &old, new))
                .sum()
        })
        .await
    }

    /// Repoint every tracked path below `old_dir` to the same relative path
    /// below `new_dir`. Returns the number of paths moved.
    pub async fn retarget_prefix(
        &self,
        old_dir: impl AsRef<Path>,
        new_dir: impl AsRef<Path>,
    ) -> ManifestResult<usize> {
        let old_dir = key(old_dir.as_ref())?;
        let new_dir = key(new_dir.as_ref())?;

        self.mutate("retarget_prefix", move |set| {
            let affected: Vec<PathBuf> = set
                .iter()
                .filter(|p| p.starts_with(&old_dir))
                .cloned()
                .collect();

            for old in &affected {
                set.remove(old);
            }

            for old in &affected {
                let relative = old.strip_prefix(&old_dir).unwrap_or(Path::new(""));
                set.insert(clean(&new_dir.join(relative)));
            }

            affected.len()
        })
        .await
    }

    /// Drop every tracked path at or below `dir`. Returns the number removed.
    pub async fn untrack_prefix(&self, dir: impl AsRef<Path>) -> ManifestResult<usize> {
        let dir = key(dir.as_ref())?;

        self.mutate("untrack_prefix", move |set| {
            let before = set.len();
            set.retain(|p| !p.starts_with(&dir));
            before - set.len()
        })
        .await
    }

    /// Tracked paths at or below `dir`, sorted
    pub async fn tracked_under(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = clean(dir.as_ref());
        let mut found: Vec<PathBuf> = self
            .paths
            .read()
            .await
            .iter()
            .filter(|p| p.starts_with(&dir))
            .cloned()
            .collect();

        found.sort();
        found
    }

    pub async fn snapshot(&self) -> TrackedSet {
        self.paths.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.paths.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.paths.read().await.is_empty()
    }

    /// Apply `apply` to a copy of the set, flush it, then publish it.
    ///
    /// `apply` returns the number of effective changes; zero skips the flush.
    /// A failed flush leaves the published set untouched.
    #[instrument(level = "debug", skip(self, apply), fields(changes))]
    async fn mutate<F>(&self, op: &'static str, apply: F) -> ManifestResult<usize>
    where
        F: FnOnce(&mut TrackedSet) -> usize,
    {
        let mut guard = self.paths.write().await;

        let mut next = guard.clone();
        let changes = apply(&mut next);
        tracing::Span::current().record("changes", changes);

        if changes == 0 {
            return Ok(0);
        }

        self.persistence.save(&next).await?;
        *guard = next;

        debug!(op, changes, tracked = guard.len(), "Manifest updated");
        Ok(changes)
    }
}

fn retarget_in(set: &mut TrackedSet, old: &Path, new: PathBuf) -> usize {
    if old == new {
        return 0;
    }

    let removed = set.remove(old);
    let inserted = set.insert(new);

    usize::from(removed) + usize::from(inserted)
}

/// Validated storage key: absolute, without `.` components or trailing separators
fn key(path: &Path) -> ManifestResult<PathBuf> {
    if !path.is_absolute() {
        return Err(ManifestError::invalid_path(path));
    }

    Ok(clean(path))
}

/// Lexical normalization: drops `.`, folds `..` into its parent (never above
/// the root) and strips trailing separators.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}
