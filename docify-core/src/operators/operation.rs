//! ``src/operators/operation.rs``
//! ============================================================================
//! # Operation requests and their reports
//!
//! Copy, move, rename, create-folder and import share an all-or-nothing
//! validation gate and report through `BatchReport`; delete is best effort per
//! item and reports through `DeleteReport`.

use crate::error::AppError;
use crate::fs::object_info::DirectoryEntry;
use bytesize::ByteSize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Copy,

    Move,

    Rename { new_name: String },

    CreateFolder { name: String },

    Delete,

    /// Bring an external file (camera capture, picker result) into the
    /// destination. Without a name the source file name is kept.
    Import {
        source: PathBuf,
        name: Option<String>,
    },
}

impl OperationKind {
    /// Operation name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Rename { .. } => "rename",
            Self::CreateFolder { .. } => "create_folder",
            Self::Delete => "delete",
            Self::Import { .. } => "import",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rename { new_name } => write!(f, "Rename(-> {new_name})"),
            Self::CreateFolder { name } => write!(f, "CreateFolder({name})"),
            Self::Import { source, .. } => write!(f, "Import({})", source.display()),
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// An operation over an ordered batch of entries.
///
/// `destination` is the target directory for copy, move, create-folder and
/// import; rename and delete ignore it.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub items: Vec<DirectoryEntry>,
    pub destination: PathBuf,
}

impl OperationRequest {
    pub fn new(kind: OperationKind, items: Vec<DirectoryEntry>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            items,
            destination: destination.into(),
        }
    }

    pub fn create_folder(name: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self::new(
            OperationKind::CreateFolder { name: name.into() },
            Vec::new(),
            destination,
        )
    }

    pub fn import(
        source: impl Into<PathBuf>,
        name: Option<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            OperationKind::Import {
                source: source.into(),
                name,
            },
            Vec::new(),
            destination,
        )
    }
}

/// Result of a successful copy, move, rename, create-folder or import.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub operation_id: String,

    /// Destination path of each top-level item, in request order
    pub completed: Vec<PathBuf>,

    /// Regular files written or moved, including those inside directories
    pub files: usize,

    pub bytes: u64,

    pub duration: Duration,
}

impl BatchReport {
    #[must_use]
    pub fn bytes_display(&self) -> String {
        ByteSize::b(self.bytes).to_string()
    }
}

/// Outcome of one top-level delete item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub path: PathBuf,
    pub result: Result<(), AppError>,
}

impl ItemOutcome {
    #[inline]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-item results of a best-effort delete, in request order.
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub operation_id: String,
    pub outcomes: Vec<ItemOutcome>,
    pub duration: Duration,
}

impl DeleteReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn deleted(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|o| o.is_ok())
            .map(|o| o.path.as_path())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_ok)
    }

    /// Deleted paths, or `DeleteFailed` naming every item that failed.
    pub fn into_result(self) -> Result<Vec<PathBuf>, AppError> {
        let (ok, failed): (Vec<ItemOutcome>, Vec<ItemOutcome>) =
            self.outcomes.into_iter().partition(ItemOutcome::is_ok);

        if failed.is_empty() {
            Ok(ok.into_iter().map(|o| o.path).collect())
        } else {
            Err(AppError::DeleteFailed {
                failed: failed.into_iter().map(|o| o.path).collect(),
            })
        }
    }
}

/// What `FileOperationEngine::execute` produced.
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    Batch(BatchReport),
    Delete(DeleteReport),
}

impl OperationOutcome {
    /// Whether every item of the operation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Batch(_) => true,
            Self::Delete(report) => report.is_success(),
        }
    }
}
