//! `src/fs/object_info.rs`
//! ============================================================
//! Directory entry snapshots and the orderings applied to listings.
//!
//! A `DirectoryEntry` is built fresh for every listing and never cached
//! across listings; callers that need the latest state list again.

use std::cmp::Ordering;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytesize::ByteSize;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::fs::path_utils;

// ------------------------------------------------------------
// SortMode: user-selectable listing order.
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    AToZ,
    ZToA,
    Newest,
    Oldest,
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AToZ => write!(f, "A-Z"),
            Self::ZToA => write!(f, "Z-A"),
            Self::Newest => write!(f, "Newest"),
            Self::Oldest => write!(f, "Oldest"),
        }
    }
}

// ------------------------------------------------------------
// DirectoryEntry: one child of a listed directory.
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    // Absolute path; the identity of the entry
    pub path: PathBuf,

    // Final path component
    pub name: CompactString,

    // Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,

    // Byte length (0 for directories)
    pub size: u64,

    pub is_dir: bool,
}

impl DirectoryEntry {
    #[must_use]
    pub fn new(path: PathBuf, is_dir: bool, modified: Option<SystemTime>, size: u64) -> Self {
        let name = CompactString::new(path_utils::file_name(&path));

        Self {
            path,
            name,
            modified,
            size: if is_dir { 0 } else { size },
            is_dir,
        }
    }

    #[must_use]
    pub fn from_metadata(path: PathBuf, meta: &Metadata) -> Self {
        Self::new(path, meta.is_dir(), meta.modified().ok(), meta.len())
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of a file entry; directories have none.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        if self.is_dir {
            return None;
        }

        path_utils::split_name(&self.name).1
    }

    /// Human-readable size ("1.2 MiB"); empty for directories.
    #[must_use]
    pub fn size_display(&self) -> String {
        if self.is_dir {
            String::new()
        } else {
            ByteSize::b(self.size).to_string()
        }
    }

    #[inline]
    fn modified_or_epoch(&self) -> SystemTime {
        self.modified.unwrap_or(UNIX_EPOCH)
    }
}

/// Case-insensitive name order with a byte-wise tie break.
fn compare_names(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

/// Total order for a listing: directories first, then by `mode`.
#[must_use]
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry, mode: SortMode) -> Ordering {
    b.is_dir.cmp(&a.is_dir).then_with(|| match mode {
        SortMode::AToZ => compare_names(a, b),
        SortMode::ZToA => compare_names(b, a),
        SortMode::Newest => b
            .modified_or_epoch()
            .cmp(&a.modified_or_epoch())
            .then_with(|| compare_names(a, b)),
        SortMode::Oldest => a
            .modified_or_epoch()
            .cmp(&b.modified_or_epoch())
            .then_with(|| compare_names(a, b)),
    })
}

pub fn sort_entries(entries: &mut [DirectoryEntry], mode: SortMode) {
    entries.sort_by(|a, b| compare_entries(a, b, mode));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(name: &str, is_dir: bool, secs: Option<u64>) -> DirectoryEntry {
        DirectoryEntry::new(
            PathBuf::from("/root").join(name),
            is_dir,
            secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)),
            10,
        )
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn fixture() -> Vec<DirectoryEntry> {
        vec![
            entry("beta.txt", false, Some(300)),
            entry("Zeta", true, Some(100)),
            entry("alpha.txt", false, Some(100)),
            entry("docs", true, Some(500)),
            entry("nodate.txt", false, None),
        ]
    }

    #[test]
    fn test_directories_first_in_every_mode() {
        for mode in [SortMode::AToZ, SortMode::ZToA, SortMode::Newest, SortMode::Oldest] {
            let mut entries = fixture();
            sort_entries(&mut entries, mode);

            let first_file = entries.iter().position(|e| !e.is_dir).unwrap();
            assert!(entries[first_file..].iter().all(|e| !e.is_dir), "mode {mode}");
            assert_eq!(first_file, 2, "mode {mode}");
        }
    }

    #[test]
    fn test_name_modes_ignore_case() {
        let mut entries = fixture();

        sort_entries(&mut entries, SortMode::AToZ);
        assert_eq!(
            names(&entries),
            ["docs", "Zeta", "alpha.txt", "beta.txt", "nodate.txt"]
        );

        sort_entries(&mut entries, SortMode::ZToA);
        assert_eq!(
            names(&entries),
            ["Zeta", "docs", "nodate.txt", "beta.txt", "alpha.txt"]
        );
    }

    #[test]
    fn test_date_modes_treat_missing_mtime_as_epoch() {
        let mut entries = fixture();

        sort_entries(&mut entries, SortMode::Newest);
        assert_eq!(
            names(&entries),
            ["docs", "Zeta", "beta.txt", "alpha.txt", "nodate.txt"]
        );

        sort_entries(&mut entries, SortMode::Oldest);
        assert_eq!(
            names(&entries),
            ["Zeta", "docs", "nodate.txt", "alpha.txt", "beta.txt"]
        );
    }

    #[test]
    fn test_entry_accessors() {
        let file = entry("scan.final.pdf", false, None);
        assert_eq!(file.extension(), Some("pdf"));
        assert_eq!(file.size_display(), ByteSize::b(10).to_string());

        let dir = entry("docs", true, None);
        assert_eq!(dir.extension(), None);
        assert_eq!(dir.size, 0);
        assert!(dir.size_display().is_empty());
    }
}
