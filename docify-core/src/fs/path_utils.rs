//! ``src/fs/path_utils.rs``
//!
//! Lexical path helpers shared by the lister and the operation engine: no
//! function here touches the filesystem.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

/// Characters rejected in any file or folder name.
pub const INVALID_NAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Whether a name is for a file or a folder; folders may not contain dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    File,
    Folder,
}

/// Lexically normalize `path`: drop `.` components, fold `..` into the
/// preceding normal component (never above the root) and strip trailing
/// separators.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
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

#[must_use]
pub fn child(dir: &Path, name: &str) -> PathBuf {
    normalize(&dir.join(name))
}

#[must_use]
pub fn parent(path: &Path) -> Option<PathBuf> {
    normalize(path).parent().map(Path::to_path_buf)
}

/// Final component of `path` as UTF-8, or empty.
#[must_use]
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or("")
}

/// Split `name` into stem and extension. A leading dot does not start an
/// extension, so `.profile` has none.
#[must_use]
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Trim and validate a user-supplied name, returning the trimmed name.
pub fn validate_name(raw: &str, kind: NameKind) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if let Some(found) = trimmed.chars().find(|c| INVALID_NAME_CHARS.contains(c)) {
        return Err(ValidationError::IllegalCharacter { found });
    }

    if kind == NameKind::Folder && trimmed.contains('.') {
        return Err(ValidationError::DotInFolderName);
    }

    Ok(trimmed.to_owned())
}

/// Keep the original file's extension whatever the user typed.
///
/// `report.txt` + `summary` → `summary.txt`; `report.txt` + `summary.pdf` →
/// `summary.txt`; `report.txt` + `summary.txt` → unchanged. Originals without
/// an extension accept the requested name as-is.
#[must_use]
pub fn preserve_extension(original: &str, requested: &str) -> String {
    let Some(original_ext) = split_name(original).1 else {
        return requested.to_owned();
    };

    let (stem, requested_ext) = split_name(requested);
    match requested_ext {
        Some(ext) if ext == original_ext => requested.to_owned(),
        _ => format!("{stem}.{original_ext}"),
    }
}

/// Component-wise ancestry check; `/a/b` is not an ancestor of `/a/bc`.
#[must_use]
pub fn is_same_or_ancestor(ancestor: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(ancestor))
}

/// Suggested name for a new folder, e.g. `Folder_2024-05-01T10-22-03-120Z`.
#[must_use]
pub fn default_folder_name(now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    format!("Folder_{}", stamp.replace([':', '.'], "-"))
}

/// Name for a captured image or document, e.g. `IMG_1714558923120.jpg`.
#[must_use]
pub fn capture_file_name(now: DateTime<Utc>, extension: &str) -> String {
    format!("IMG_{}.{}", now.timestamp_millis(), extension.trim_start_matches('.'))
}
