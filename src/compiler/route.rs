//! Source path ↔ output directory mapping.
//!
//! ```text
//! content/index.md        → content-build/index.html
//! content/about.md        → content-build/about/index.html
//! content/guide/intro.md  → content-build/guide/intro/index.html
//! ```
//!
//! Only the root `index.md` maps onto the output root itself; a nested
//! `guide/index.md` gets its own `guide/index/` unit like any other file.

use std::path::{Path, PathBuf};

use super::error::{BuildError, Result};
use crate::config::SiteConfig;
use crate::utils::path::{canonicalize_existing_prefix, clean_path};

/// File written inside every output unit.
pub const INDEX_FILE: &str = "index.html";

/// Suffix identifying markdown documents (exact, case-sensitive).
const MARKDOWN_SUFFIX: &str = ".md";

/// Root document mapped onto the output root.
const ROOT_SENTINEL: &str = "index.md";

/// Pure translation between source documents and output units.
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    /// `source_root` with symlinks resolved, for containment checks
    canonical_root: PathBuf,
    output_root: PathBuf,
    cwd: PathBuf,
}

impl PathMapper {
    pub fn new(config: &SiteConfig) -> Self {
        Self::with_roots(config.content_dir(), config.output_dir(), &config.cwd)
    }

    /// `source_root` and `output_root` must be absolute; `cwd` anchors
    /// relative input paths.
    pub fn with_roots(source_root: &Path, output_root: &Path, cwd: &Path) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            canonical_root: canonicalize_existing_prefix(source_root)
                .unwrap_or_else(|| source_root.to_path_buf()),
            output_root: output_root.to_path_buf(),
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Normalize an absolute or cwd-relative path to one relative to the
    /// source root.
    ///
    /// Symlinks are followed as far as the path exists: a link below the
    /// root that points outside of it is out of scope.
    pub fn relative(&self, path: &Path) -> Result<PathBuf> {
        let absolute = clean_path(&self.cwd.join(path));
        let canonical = canonicalize_existing_prefix(&absolute);

        let relative = match absolute.strip_prefix(&self.source_root) {
            Ok(relative) => relative.to_path_buf(),
            // Symlinked parent (e.g. /tmp -> /private/tmp) of a canonical root
            Err(_) => canonical
                .as_deref()
                .and_then(|c| c.strip_prefix(&self.canonical_root).ok())
                .map(Path::to_path_buf)
                .ok_or_else(|| self.out_of_scope(path))?,
        };

        let escapes = canonical.is_some_and(|c| !c.starts_with(&self.canonical_root));
        if escapes || relative.as_os_str().is_empty() {
            return Err(self.out_of_scope(path));
        }
        Ok(relative)
    }

    /// Absolute location of a document inside the source root.
    pub fn source_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.source_root.join(self.relative(path)?))
    }

    /// Output unit directory of a document.
    pub fn to_output_dir(&self, path: &Path) -> Result<PathBuf> {
        let relative = self.relative(path)?;

        if relative == Path::new(ROOT_SENTINEL) {
            return Ok(self.output_root.clone());
        }
        Ok(self.output_root.join(strip_markdown_suffix(&relative)))
    }

    /// Index file of a document's output unit.
    pub fn index_file(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.to_output_dir(path)?.join(INDEX_FILE))
    }

    fn out_of_scope(&self, path: &Path) -> BuildError {
        BuildError::OutOfScope {
            path: path.to_path_buf(),
            root: self.source_root.clone(),
        }
    }
}

/// Whether a file name ends in `.md` (a bare `.md` does not count).
pub fn is_markdown(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > MARKDOWN_SUFFIX.len() && name.ends_with(MARKDOWN_SUFFIX))
}

/// Drop the trailing `.md` of the final segment, if it has one.
fn strip_markdown_suffix(relative: &Path) -> PathBuf {
    if !is_markdown(relative) {
        return relative.to_path_buf();
    }
    let name = relative
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    relative.with_file_name(&name[..name.len() - MARKDOWN_SUFFIX.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PathMapper {
        PathMapper::with_roots(
            Path::new("/site/content"),
            Path::new("/site/content-build"),
            Path::new("/site"),
        )
    }

    #[test]
    fn test_root_sentinel_maps_to_output_root() {
        let m = mapper();
        assert_eq!(
            m.to_output_dir(Path::new("/site/content/index.md")).unwrap(),
            PathBuf::from("/site/content-build")
        );
        assert_eq!(
            m.index_file(Path::new("content/index.md")).unwrap(),
            PathBuf::from("/site/content-build/index.html")
        );
    }

    #[test]
    fn test_documents_map_to_stem_directories() {
        let m = mapper();
        let cases = [
            ("content/about.md", "/site/content-build/about"),
            ("content/guide/intro.md", "/site/content-build/guide/intro"),
            ("content/guide/index.md", "/site/content-build/guide/index"),
            ("/site/content/a/b/c.md", "/site/content-build/a/b/c"),
            ("./content/./guide/../notes.md", "/site/content-build/notes"),
        ];
        for (source, expected) in cases {
            assert_eq!(
                m.to_output_dir(Path::new(source)).unwrap(),
                PathBuf::from(expected),
                "{source}"
            );
        }
    }

    #[test]
    fn test_suffix_stripping_is_exact() {
        let m = mapper();
        assert_eq!(
            m.to_output_dir(Path::new("content/README.MD")).unwrap(),
            PathBuf::from("/site/content-build/README.MD")
        );
        assert_eq!(
            m.to_output_dir(Path::new("content/notes.md.bak")).unwrap(),
            PathBuf::from("/site/content-build/notes.md.bak")
        );
        assert_eq!(
            m.to_output_dir(Path::new("content/v1.2.md")).unwrap(),
            PathBuf::from("/site/content-build/v1.2")
        );
    }

    #[test]
    fn test_out_of_scope() {
        let m = mapper();
        for path in ["/elsewhere/a.md", "../a.md", "content/../other/a.md", "content"] {
            assert!(
                matches!(
                    m.to_output_dir(Path::new(path)),
                    Err(BuildError::OutOfScope { .. })
                ),
                "{path}"
            );
        }
    }

    #[test]
    fn test_is_markdown() {
        assert!(is_markdown(Path::new("a/b.md")));
        assert!(!is_markdown(Path::new("a/b.MD")));
        assert!(!is_markdown(Path::new("a/.md")));
        assert!(!is_markdown(Path::new("a/b.mdx")));
        assert!(!is_markdown(Path::new("a/b")));
    }

    #[test]
    fn test_symlinked_parent_resolves() {
        let temp = tempfile::TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir_all(real.join("guide")).unwrap();
        let source_root = real.canonicalize().unwrap();

        #[cfg(unix)]
        {
            let link = temp.path().join("link");
            std::os::unix::fs::symlink(&real, &link).unwrap();
            let m = PathMapper::with_roots(&source_root, Path::new("/out"), temp.path());
            assert_eq!(
                m.to_output_dir(&link.join("guide/intro.md")).unwrap(),
                PathBuf::from("/out/guide/intro")
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_leaving_root_is_out_of_scope() {
        let temp = tempfile::TempDir::new().unwrap();
        let content = temp.path().join("content");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.md"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, content.join("link")).unwrap();

        let source_root = content.canonicalize().unwrap();
        let m = PathMapper::with_roots(&source_root, Path::new("/out"), temp.path());

        for path in [
            source_root.join("link/secret.md"),
            source_root.join("link/missing.md"),
        ] {
            assert!(
                matches!(m.to_output_dir(&path), Err(BuildError::OutOfScope { .. })),
                "{}",
                path.display()
            );
        }
        assert!(m.to_output_dir(&source_root.join("real.md")).is_ok());
    }
}
