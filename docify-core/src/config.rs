//! src/config.rs
//! ============================================================================
//! # Config: Application Configuration Loader and Saver (directories only)
//!
//! Loads and saves settings as TOML from the platform config directory using
//! the [`directories`](https://docs.rs/directories) crate. Every section has
//! defaults, so a partial file (or none at all) is a valid configuration.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! let root = config.resolved_root()?;
//! ```

use crate::fs::object_info::SortMode;
use crate::logging::LoggerConfig;
use anyhow::Context;
use compact_str::CompactString;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs as TokioFs;
use tracing::info;
use trackr::PersistenceConfig;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "example";
const APPLICATION: &str = "Docify";

/// Directory under the platform data dir that holds the user's documents.
const STORAGE_DIR: &str = "myapp";
const MANIFEST_FILE: &str = "tracked_files.msgpack";

/// Operation engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sibling file copies in flight while copying a directory
    pub copy_concurrency: usize,

    /// Operations slower than this are logged at warn level
    #[serde(with = "humantime_serde")]
    pub slow_operation_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            copy_concurrency: 4,
            slow_operation_threshold: Duration::from_secs(2),
        }
    }
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage root override; `<data dir>/myapp` when absent
    pub root_dir: Option<PathBuf>,

    /// Label shown in place of the root in breadcrumbs
    pub root_label: CompactString,

    pub default_sort: SortMode,

    pub engine: EngineConfig,

    pub manifest: PersistenceConfig,

    pub logging: LoggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: None,
            root_label: CompactString::const_new("Docify"),
            default_sort: SortMode::default(),
            engine: EngineConfig::default(),
            manifest: PersistenceConfig::default(),
            logging: LoggerConfig::default(),
        }
    }
}

impl Config {
    /// Loads config from the platform config dir, creating a default file on
    /// first run.
    pub async fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?).await
    }

    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;

            Ok(toml::from_str(&text)?)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(path).await?;

            Ok(default_config)
        }
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str).await?;

        Ok(())
    }

    /// Storage root: the override, or `<data dir>/myapp`.
    pub fn resolved_root(&self) -> anyhow::Result<PathBuf> {
        match &self.root_dir {
            Some(root) => Ok(root.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(STORAGE_DIR)),
        }
    }

    /// Manifest file: the override, or a file in the platform data dir.
    pub fn manifest_file(&self) -> anyhow::Result<PathBuf> {
        match &self.manifest.file {
            Some(file) => Ok(file.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(MANIFEST_FILE)),
        }
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    fn project_dirs() -> anyhow::Result<ProjectDirs> {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_first_load_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).await.unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        TokioFs::write(
            &path,
            "root_dir = \"/storage/docs\"\ndefault_sort = \"newest\"\n\n[engine]\nslow_operation_threshold = \"500ms\"\n",
        )
        .await
        .unwrap();

        let config = Config::load_from(&path).await.unwrap();

        assert_eq!(config.resolved_root().unwrap(), PathBuf::from("/storage/docs"));
        assert_eq!(config.default_sort, SortMode::Newest);
        assert_eq!(config.engine.copy_concurrency, 4);
        assert_eq!(
            config.engine.slow_operation_threshold,
            Duration::from_millis(500)
        );
        assert_eq!(config.root_label, "Docify");
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        TokioFs::write(&path, "default_sort = [").await.unwrap();

        assert!(Config::load_from(&path).await.is_err());
    }

    #[test]
    fn test_manifest_file_override() {
        let mut config = Config::default();
        config.manifest.file = Some(PathBuf::from("/data/manifest.msgpack"));

        assert_eq!(
            config.manifest_file().unwrap(),
            PathBuf::from("/data/manifest.msgpack")
        );
    }
}
