//! ``src/model/selection.rs``
//! ============================================================================
//! # `Selection`: tap-driven multi-select state
//!
//! A long press starts a selection; while a selection is active every tap
//! toggles membership. With nothing selected a short tap activates the entry
//! instead (navigate into a directory, open a file). Entries are identified by
//! path and kept in the order they were selected.

use crate::fs::object_info::DirectoryEntry;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Derived from the item count: `None` ⇔ 0, `Single` ⇔ 1, `Multiple` ⇔ ≥2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    None,
    Single,
    Multiple,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Single => "single",
            Self::Multiple => "multiple",
        };

        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Short,
    Long,
}

/// What a tap asks the host to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// Selection changed; it is now in this mode.
    Selection(SelectionMode),

    /// Short tap on a directory with nothing selected.
    Navigate(PathBuf),

    /// Short tap on a file with nothing selected.
    Open(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    items: IndexMap<PathBuf, DirectoryEntry>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        match self.items.len() {
            0 => SelectionMode::None,
            1 => SelectionMode::Single,
            _ => SelectionMode::Multiple,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.items.contains_key(path)
    }

    pub fn items(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.items.values()
    }

    pub fn tap(&mut self, entry: &DirectoryEntry, press: Press) -> TapOutcome {
        if self.is_empty() {
            match press {
                Press::Long => {
                    self.items.insert(entry.path.clone(), entry.clone());
                }
                Press::Short if entry.is_dir => return TapOutcome::Navigate(entry.path.clone()),
                Press::Short => return TapOutcome::Open(entry.path.clone()),
            }
        } else if self.items.shift_remove(&entry.path).is_none() {
            self.items.insert(entry.path.clone(), entry.clone());
        }

        trace!(path = %entry.path.display(), mode = %self.mode(), "Selection toggled");
        TapOutcome::Selection(self.mode())
    }

    /// Select every listed entry, or clear if they are all selected already.
    pub fn select_all(&mut self, listed: &[DirectoryEntry]) -> SelectionMode {
        let all_selected = listed.iter().all(|e| self.contains(&e.path));

        self.items.clear();
        if !all_selected {
            self.items
                .extend(listed.iter().map(|e| (e.path.clone(), e.clone())));
        }

        self.mode()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keep only the entries whose path satisfies `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.items.retain(|path, _| keep(path));
    }

    /// Ordered copy of the selected entries, safe to hand to a background task.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DirectoryEntry> {
        self.items.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> DirectoryEntry {
        DirectoryEntry::new(PathBuf::from("/root").join(name), false, None, 1)
    }

    fn dir(name: &str) -> DirectoryEntry {
        DirectoryEntry::new(PathBuf::from("/root").join(name), true, None, 0)
    }

    #[test]
    fn test_short_tap_without_selection_activates() {
        let mut selection = Selection::new();

        assert_eq!(
            selection.tap(&dir("docs"), Press::Short),
            TapOutcome::Navigate(PathBuf::from("/root/docs"))
        );
        assert_eq!(
            selection.tap(&file("a.pdf"), Press::Short),
            TapOutcome::Open(PathBuf::from("/root/a.pdf"))
        );
        assert_eq!(selection.mode(), SelectionMode::None);
    }

    #[test]
    fn test_long_press_then_taps_toggle() {
        let mut selection = Selection::new();
        let a = file("a.pdf");
        let b = dir("docs");

        assert_eq!(
            selection.tap(&a, Press::Long),
            TapOutcome::Selection(SelectionMode::Single)
        );
        assert_eq!(
            selection.tap(&b, Press::Short),
            TapOutcome::Selection(SelectionMode::Multiple)
        );
        assert_eq!(
            selection.tap(&a, Press::Short),
            TapOutcome::Selection(SelectionMode::Single)
        );
        assert_eq!(
            selection.tap(&b, Press::Long),
            TapOutcome::Selection(SelectionMode::None)
        );
        assert!(selection.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_selection_order() {
        let mut selection = Selection::new();
        selection.tap(&file("c.txt"), Press::Long);
        selection.tap(&file("a.txt"), Press::Short);
        selection.tap(&file("b.txt"), Press::Short);

        let names: Vec<_> = selection
            .snapshot()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, ["c.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_select_all_twice_clears() {
        let listed = vec![dir("docs"), file("a.pdf"), file("b.jpg")];
        let mut selection = Selection::new();

        assert_eq!(selection.select_all(&listed), SelectionMode::Multiple);
        assert_eq!(selection.len(), 3);

        assert_eq!(selection.select_all(&listed), SelectionMode::None);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_completes_partial_selection() {
        let listed = vec![file("a.pdf"), file("b.jpg")];
        let mut selection = Selection::new();
        selection.tap(&listed[1], Press::Long);

        assert_eq!(selection.select_all(&listed), SelectionMode::Multiple);
        assert!(selection.contains(Path::new("/root/a.pdf")));

        let single = vec![file("only.txt")];
        assert_eq!(selection.select_all(&single), SelectionMode::Single);
        assert_eq!(selection.select_all(&[]), SelectionMode::None);
    }
}
