//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! content = "content"         # Markdown source tree (relative to the config file)
//! output = "content-build"    # Rendered tree; defaults to "<content>-build" next to content
//! ```
//!
//! The output directory is owned by skriv: it is deleted and recreated on
//! every start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to the content directory name for the default output.
const OUTPUT_SUFFIX: &str = "-build";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Markdown source directory.
    pub content: PathBuf,

    /// Rendered output directory. Empty means "derive from `content`".
    pub output: PathBuf,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            content: PathBuf::from("content"),
            output: PathBuf::new(),
        }
    }
}

impl BuildSectionConfig {
    /// Sibling output directory for a content directory:
    /// `/site/content` -> `/site/content-build`.
    pub fn default_output_for(content: &Path) -> PathBuf {
        let name = content
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content".to_string());
        content.with_file_name(format!("{name}{OUTPUT_SUFFIX}"))
    }
}
