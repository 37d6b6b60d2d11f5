//! Empty directory pruning for the output tree.
//!
//! Removing or moving a document leaves its unit directory, and possibly a
//! chain of parents, without entries. Directories are visited deepest
//! first so a removed leaf exposes its parent within the same pass.

use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::{debug, log};

/// Outcome of a pruning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: usize,
    pub failed: usize,
}

/// Remove every empty directory below `root`. `root` itself is kept.
pub fn prune_empty(root: &Path) -> PruneReport {
    let mut report = PruneReport::default();

    for dir in directories_deepest_first(root) {
        match fs::remove_dir(&dir) {
            Ok(()) => {
                debug!("prune"; "removed {}", dir.display());
                report.removed += 1;
            }
            Err(err) if is_benign(&err) => {}
            Err(err) => {
                log!("prune"; "failed to remove {}: {}", dir.display(), err);
                report.failed += 1;
            }
        }
    }

    report
}

/// Errors that are the steady state of pruning rather than failures:
/// the directory still holds another document, or is already gone.
pub fn is_benign(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::NotFound
    )
}

fn directories_deepest_first(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path())
        .collect();

    dirs.sort_by_key(|p| Reverse(p.components().count()));
    dirs
}
