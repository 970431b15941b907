//! Manifest error handling with compact, cloneable variants

use compact_str::CompactString;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors raised by the manifest store and its persistence backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Invalid manifest path (must be absolute): {0}")]
    InvalidPath(CompactString),

    #[error("Manifest file system error on {path}: {kind:?}")]
    FileSystem {
        path: CompactString,
        kind: ErrorKind,
    },

    #[error("Manifest serialization error: {0}")]
    Serialization(CompactString),

    #[error("Manifest deserialization failed: {0}")]
    Deserialization(CompactString),

    #[error("Manifest file corrupted: {path}")]
    Corrupted { path: CompactString },

    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Atomic manifest save failed: {0}")]
    AtomicSave(CompactString),
}

impl ManifestError {
    /// Check if error comes from reading or writing the manifest file
    #[inline]
    pub fn is_persistence_error(&self) -> bool {
        matches!(
            self,
            ManifestError::FileSystem { .. }
                | ManifestError::Corrupted { .. }
                | ManifestError::VersionMismatch { .. }
                | ManifestError::Deserialization(_)
                | ManifestError::AtomicSave(_)
        )
    }

    #[inline]
    pub fn invalid_path(path: &Path) -> Self {
        Self::InvalidPath(CompactString::from(path.to_string_lossy()))
    }

    #[inline]
    pub fn file_system(path: &Path, err: &std::io::Error) -> Self {
        Self::FileSystem {
            path: CompactString::from(path.to_string_lossy()),
            kind: err.kind(),
        }
    }

    #[inline]
    pub fn corrupted(path: &Path) -> Self {
        Self::Corrupted {
            path: CompactString::from(path.to_string_lossy()),
        }
    }

    #[inline]
    pub fn atomic_save(message: impl Into<CompactString>) -> Self {
        Self::AtomicSave(message.into())
    }
}

impl From<rmp_serde::encode::Error> for ManifestError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ManifestError::Serialization(CompactString::from(err.to_string()))
    }
}

impl From<rmp_serde::decode::Error> for ManifestError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ManifestError::Deserialization(CompactString::from(err.to_string()))
    }
}
