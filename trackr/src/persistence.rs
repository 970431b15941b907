//! Manifest persistence backends
//!
//! The manifest is written through on every effective mutation, so saves must
//! be crash-safe: the file backend serializes to MessagePack, writes a
//! temporary file and swaps it in with a rename. A `.bak` copy of the previous
//! state is kept and used when the primary file turns out to be corrupted.

use crate::config::PersistenceConfig;
use crate::error::{ManifestError, ManifestResult};
use crate::TrackedSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage seam for the tracked path set
#[async_trait]
pub trait ManifestPersistence: Send + Sync {
    /// Load the persisted set. A missing store yields an empty set.
    async fn load(&self) -> ManifestResult<TrackedSet>;

    /// Replace the persisted set with `paths`.
    async fn save(&self, paths: &TrackedSet) -> ManifestResult<()>;
}

/// Persisted manifest envelope with versioning
#[derive(Debug, Serialize, Deserialize)]
struct PersistedManifest {
    /// File format version
    version: u32,

    /// Seconds since the epoch at save time
    saved_at: u64,

    /// Tracked paths, sorted for stable output
    paths: Vec<PathBuf>,

    /// Data integrity checksum
    checksum: Option<u64>,
}

/// MessagePack file backend with atomic saves
#[derive(Debug)]
pub struct FilePersistence {
    file_path: PathBuf,
    temp_path: PathBuf,
    backup_path: PathBuf,
    config: PersistenceConfig,
}

impl FilePersistence {
    /// Current persistence file format version
    const CURRENT_VERSION: u32 = 1;

    pub fn new(file_path: PathBuf, config: PersistenceConfig) -> ManifestResult<Self> {
        let temp_path = file_path.with_extension("tmp");
        let backup_path = file_path.with_extension("bak");

        if let Some(parent) = file_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ManifestError::file_system(parent, &e))?;
        }

        Ok(Self {
            file_path,
            temp_path,
            backup_path,
            config,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    async fn try_load_from_file(&self, path: &Path) -> ManifestResult<TrackedSet> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TrackedSet::new());
            }
            Err(e) => return Err(ManifestError::file_system(path, &e)),
        };

        self.decode(path, &data)
    }

    fn decode(&self, path: &Path, data: &[u8]) -> ManifestResult<TrackedSet> {
        let persisted: PersistedManifest = rmp_serde::from_slice(data)?;

        if persisted.version > Self::CURRENT_VERSION {
            return Err(ManifestError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: persisted.version,
            });
        }

        if self.config.validate_checksums
            && let Some(stored) = persisted.checksum
            && stored != checksum(&persisted.paths)
        {
            return Err(ManifestError::corrupted(path));
        }

        Ok(persisted.paths.into_iter().collect())
    }

    fn encode(&self, paths: &TrackedSet) -> ManifestResult<Vec<u8>> {
        let mut sorted: Vec<PathBuf> = paths.iter().cloned().collect();
        sorted.sort();

        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let digest = self.config.validate_checksums.then(|| checksum(&sorted));

        let persisted = PersistedManifest {
            version: Self::CURRENT_VERSION,
            saved_at,
            paths: sorted,
            checksum: digest,
        };

        Ok(rmp_serde::to_vec(&persisted)?)
    }

    async fn create_backup(&self) -> ManifestResult<()> {
        match fs::copy(&self.file_path, &self.backup_path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ManifestError::file_system(&self.backup_path, &e)),
        }
    }

    async fn atomic_save(&self, data: &[u8]) -> ManifestResult<()> {
        fs::write(&self.temp_path, data)
            .await
            .map_err(|e| ManifestError::atomic_save(format!("Failed to write temp file: {e}")))?;

        fs::rename(&self.temp_path, &self.file_path)
            .await
            .map_err(|e| ManifestError::atomic_save(format!("Failed to rename temp file: {e}")))?;

        Ok(())
    }

    /// Remove a leftover temporary file from an interrupted save
    pub async fn cleanup(&self) -> ManifestResult<()> {
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => {
                warn!(path = %self.temp_path.display(), "Removed leftover manifest temp file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ManifestError::file_system(&self.temp_path, &e)),
        }
    }
}

#[async_trait]
impl ManifestPersistence for FilePersistence {
    async fn load(&self) -> ManifestResult<TrackedSet> {
        match self.try_load_from_file(&self.file_path).await {
            Ok(paths) => {
                debug!(path = %self.file_path.display(), tracked = paths.len(), "Manifest loaded");
                Ok(paths)
            }

            Err(e @ (ManifestError::Corrupted { .. } | ManifestError::Deserialization(_))) => {
                warn!(
                    path = %self.file_path.display(),
                    error = %e,
                    "Manifest file corrupted, trying backup"
                );

                if !fs::try_exists(&self.backup_path).await.unwrap_or(false) {
                    return Err(e);
                }

                match self.try_load_from_file(&self.backup_path).await {
                    Ok(paths) => Ok(paths),
                    Err(backup_err) => {
                        warn!(error = %backup_err, "Manifest backup unusable");
                        Err(e)
                    }
                }
            }

            Err(e) => Err(e),
        }
    }

    async fn save(&self, paths: &TrackedSet) -> ManifestResult<()> {
        if self.config.create_backups {
            self.create_backup().await?;
        }

        let data = self.encode(paths)?;
        self.atomic_save(&data).await?;

        debug!(path = %self.file_path.display(), tracked = paths.len(), "Manifest saved");
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<TrackedSet>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            stored: Mutex::new(paths.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make every following save fail, to exercise flush-failure paths
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> TrackedSet {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl ManifestPersistence for MemoryPersistence {
    async fn load(&self) -> ManifestResult<TrackedSet> {
        Ok(self.stored.lock().await.clone())
    }

    async fn save(&self, paths: &TrackedSet) -> ManifestResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ManifestError::atomic_save("memory backend refused save"));
        }

        *self.stored.lock().await = paths.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Order-sensitive checksum over sorted paths
fn checksum(paths: &[PathBuf]) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();

    paths.len().hash(&mut hasher);
    for path in paths {
        path.hash(&mut hasher);
    }

    hasher.finish()
}
