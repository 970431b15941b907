use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Manifest persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Manifest file location (None = platform data directory)
    pub file: Option<PathBuf>,

    /// Keep a `.bak` copy of the previous manifest before each save
    pub create_backups: bool,

    /// Validate checksums on load
    pub validate_checksums: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            file: None,
            create_backups: true,
            validate_checksums: true,
        }
    }
}
