use std::ffi::OsString;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::types::{Change, ChangeKind};
use crate::compiler::{INDEX_FILE, PathMapper, collect_sources, is_markdown};
use crate::debug;

/// Classifies a debounced batch into actionable document changes.
///
/// Pipeline: expand_directories → filter_documents → correct_by_existence
pub(super) struct EventClassifier;

impl EventClassifier {
    /// Main classification pipeline. Order is preserved.
    pub(super) fn classify(changes: Vec<Change>, mapper: &PathMapper) -> Vec<Change> {
        changes
            .into_iter()
            .flat_map(|change| Self::expand_directories(change, mapper))
            .filter_map(|change| Self::filter_documents(change, mapper))
            .filter_map(Self::correct_by_existence)
            .collect()
    }

    /// Turn directory-level events into per-document events.
    ///
    /// - Moved directory: one Moved per document below the destination
    /// - Created directory (moved in from outside): one Created per document
    /// - Removed directory (moved out, or gone): one Removed per document
    ///   that still has output below the directory's unit
    fn expand_directories(change: Change, mapper: &PathMapper) -> Vec<Change> {
        match &change.kind {
            ChangeKind::Moved { from } if change.path.is_dir() => {
                debug!("watch"; "expand moved dir: {}", change.path.display());
                collect_sources(&change.path)
                    .into_iter()
                    .filter_map(|doc| {
                        let relative = doc.strip_prefix(&change.path).ok()?;
                        Some(Change::moved(from.join(relative), doc.clone()))
                    })
                    .collect()
            }
            ChangeKind::Created if change.path.is_dir() => {
                debug!("watch"; "expand created dir: {}", change.path.display());
                collect_sources(&change.path)
                    .into_iter()
                    .map(|doc| Change::new(doc, ChangeKind::Created))
                    .collect()
            }
            ChangeKind::Removed if !is_markdown(&change.path) && !change.path.exists() => {
                built_documents_below(&change.path, mapper)
                    .into_iter()
                    .map(|doc| Change::new(doc, ChangeKind::Removed))
                    .collect()
            }
            _ => vec![change],
        }
    }

    /// Keep markdown documents below the source root.
    ///
    /// A rename across the `.md` boundary is a creation or a deletion.
    fn filter_documents(change: Change, mapper: &PathMapper) -> Option<Change> {
        if !is_document(&change.path, mapper) {
            if let ChangeKind::Moved { from } = change.kind
                && is_document(&from, mapper)
            {
                debug!("watch"; "moved out of scope: {}", from.display());
                return Some(Change::new(from, ChangeKind::Removed));
            }
            return None;
        }

        match change.kind {
            ChangeKind::Moved { from } if !is_document(&from, mapper) => {
                debug!("watch"; "moved into scope: {}", change.path.display());
                Some(Change::new(change.path, ChangeKind::Created))
            }
            kind => Some(Change::new(change.path, kind)),
        }
    }

    /// Reconcile event kinds with actual filesystem state.
    ///
    /// The watcher may report stale events (e.g., Created for a file that's
    /// already been deleted, or Removed for a file that still exists after an
    /// atomic save).
    fn correct_by_existence(change: Change) -> Option<Change> {
        let path = change.path;
        let is_file = path.is_file();

        match change.kind {
            ChangeKind::Created if !is_file => {
                debug!("watch"; "discard created (gone): {}", path.display());
                None
            }
            ChangeKind::Modified if !path.exists() => {
                debug!("watch"; "upgrade modified->removed: {}", path.display());
                Some(Change::new(path, ChangeKind::Removed))
            }
            ChangeKind::Modified if !is_file => None,
            ChangeKind::Removed if is_file => {
                debug!("watch"; "downgrade removed->modified: {}", path.display());
                Some(Change::new(path, ChangeKind::Modified))
            }
            ChangeKind::Moved { from } if !is_file => {
                debug!("watch"; "destination gone, removing: {}", from.display());
                Some(Change::new(from, ChangeKind::Removed))
            }
            // Copy rather than rename: the source keeps its output
            ChangeKind::Moved { from } if from.is_file() => {
                debug!("watch"; "source still present: {}", from.display());
                Some(Change::new(path, ChangeKind::Created))
            }
            kind => Some(Change::new(path, kind)),
        }
    }
}

/// A markdown file below the source root.
fn is_document(path: &Path, mapper: &PathMapper) -> bool {
    is_markdown(path) && mapper.relative(path).is_ok()
}

/// Source documents that had output inside the unit of a vanished directory.
///
/// `dir/a/b/index.html` in the output tree belongs to `dir/a/b.md`; the
/// index file directly inside the unit belongs to the sibling `dir.md` and
/// is left alone.
fn built_documents_below(dir: &Path, mapper: &PathMapper) -> Vec<PathBuf> {
    let Ok(relative) = mapper.relative(dir) else {
        return Vec::new();
    };
    let unit = mapper.output_root().join(&relative);
    if !unit.is_dir() {
        return Vec::new();
    }
    debug!("watch"; "expand removed dir: {}", dir.display());

    let source_dir = mapper.source_root().join(&relative);
    WalkDir::new(&unit)
        .skip_hidden(false)
        .min_depth(2)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == INDEX_FILE)
        .filter_map(|e| {
            let stem = e.parent_path().strip_prefix(&unit).ok()?.to_path_buf();
            let mut doc: OsString = source_dir.join(stem).into_os_string();
            doc.push(".md");
            Some(PathBuf::from(doc))
        })
        .collect()
}
