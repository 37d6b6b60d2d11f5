//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::compiler::INDEX_FILE;

/// Resolve URL to a file under `serve_root`, handling index.html for
/// directories. `None` means 404.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url)?;

    // Reject traversal segments early
    if clean.split('/').any(|segment| segment == ".." || segment == ".") {
        return None;
    }

    let local = serve_root.join(&clean);

    // Canonicalize to resolve symlinks and verify path is under serve_root
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;

    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join(INDEX_FILE);
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Strip query and fragment, decode, trim slashes. `None` if the path does
/// not decode to UTF-8 or carries a NUL byte.
fn normalize_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    if decoded.contains('\0') || decoded.contains('\\') {
        return None;
    }
    Some(decoded.trim_matches('/').to_string())
}
