//! src/error.rs
//! ============================================================================
//! # `AppError`: Unified Error Type for the Docify core
//!
//! Every fallible operation of the lister, the navigation context and the
//! operation engine returns `Result<T, AppError>`. Pre-flight failures
//! (`InvalidOperation`, `NameConflict`, `Validation`) are raised before any
//! filesystem or manifest mutation; `PartialBatch` and `DeleteFailed` report
//! best-effort work that was not rolled back.

use std::{io, path::PathBuf};
use thiserror::Error;
use trackr::ManifestError;

/// User-facing name validation failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Name contains invalid characters (\\ / : * ? \" < > |)")]
    IllegalCharacter { found: char },

    #[error("Folder names cannot contain dots")]
    DotInFolderName,
}

/// Unified error type for all core operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Underlying read/write/permission failure on a specific path.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory could not be listed for a reason other than non-existence.
    #[error("Directory unreadable: {path:?}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Self-containment violation, wrong batch size or similar misuse.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Destination already holds an entry with this name.
    #[error("A file or folder named \"{name}\" already exists in {destination:?}")]
    NameConflict { name: String, destination: PathBuf },

    /// Name rejected by validation rules.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Manifest store failure.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Mid-batch failure; completed items are kept, not rolled back.
    #[error("Operation failed on {failed:?} after {} completed item(s): {source}", .completed.len())]
    PartialBatch {
        failed: PathBuf,
        completed: Vec<PathBuf>,
        #[source]
        source: Box<AppError>,
    },

    /// One or more items of a best-effort delete failed.
    #[error("Failed to delete {} item(s): {failed:?}", .failed.len())]
    DeleteFailed { failed: Vec<PathBuf> },

    /// Operation was cancelled by user or system.
    #[error("Operation was cancelled")]
    Cancelled,

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl AppError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation<S: Into<String>>(reason: S) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create a name conflict error
    pub fn name_conflict<S: Into<String>, P: Into<PathBuf>>(name: S, destination: P) -> Self {
        Self::NameConflict {
            name: name.into(),
            destination: destination.into(),
        }
    }

    /// Wrap a mid-batch failure with the list of items already done.
    pub fn partial_batch<P: Into<PathBuf>>(failed: P, completed: Vec<PathBuf>, source: Self) -> Self {
        Self::PartialBatch {
            failed: failed.into(),
            completed,
            source: Box::new(source),
        }
    }

    /// Errors raised at the validation gate, before any mutation.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation { .. } | Self::NameConflict { .. } | Self::Validation(_)
        )
    }

    /// Underlying I/O error kind, if any.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } | Self::DirectoryUnreadable { source, .. } => {
                Some(source.kind())
            }
            Self::PartialBatch { source, .. } => source.io_kind(),
            _ => None,
        }
    }
}

// Manual Clone implementation to handle non-Clone fields
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            Self::Io { path, source } => Self::Io {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::DirectoryUnreadable { path, source } => Self::DirectoryUnreadable {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::InvalidOperation { reason } => Self::InvalidOperation {
                reason: reason.clone(),
            },
            Self::NameConflict { name, destination } => Self::NameConflict {
                name: name.clone(),
                destination: destination.clone(),
            },
            Self::Validation(e) => Self::Validation(*e),
            Self::Manifest(e) => Self::Manifest(e.clone()),
            Self::PartialBatch {
                failed,
                completed,
                source,
            } => Self::PartialBatch {
                failed: failed.clone(),
                completed: completed.clone(),
                source: source.clone(),
            },
            Self::DeleteFailed { failed } => Self::DeleteFailed {
                failed: failed.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::Config(e) => Self::Config(e.clone()),
        }
    }
}
