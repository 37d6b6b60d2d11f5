//! The incremental build engine.
//!
//! ```text
//! route     source path → output unit (pure)
//! markdown  source bytes → html bytes (pure)
//! janitor   empty-directory pruning of the output tree
//! Builder   full build, and single-document build / remove / move
//! ```
//!
//! This is the only place that writes to the output tree.

pub mod error;
pub mod janitor;
pub mod markdown;
pub mod route;

#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use rayon::prelude::*;

pub use error::{BuildError, Result};
pub use janitor::PruneReport;
pub use markdown::{MarkdownRenderer, Render};
pub use route::{INDEX_FILE, PathMapper, is_markdown};

use crate::logger::ProgressLine;
use crate::{debug, log};

/// Outcome of a full build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub built: usize,
    pub failed: usize,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.built + self.failed
    }
}

/// How `move_one` relocated a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Rendered output was renamed into the new unit, no render.
    Relocated(PathBuf),
    /// No usable old output; the new location was rendered from source.
    Rebuilt(PathBuf),
}

/// Builds documents from the source tree into the output tree.
pub struct Builder<R = MarkdownRenderer> {
    mapper: PathMapper,
    renderer: R,
}

impl<R: Render> Builder<R> {
    pub fn new(mapper: PathMapper, renderer: R) -> Self {
        Self { mapper, renderer }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Wipe the output root and render every document into it.
    ///
    /// Failing to reset the output root is the only error; per-document
    /// failures are logged and counted in the report.
    pub fn full_build(&self) -> Result<BuildReport> {
        let output = self.mapper.output_root();

        match fs::remove_dir_all(output) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(BuildError::io("clear", output)(err)),
        }
        fs::create_dir_all(output).map_err(BuildError::io("create", output))?;

        let sources = collect_sources(self.mapper.source_root());
        debug!("build"; "found {} documents", sources.len());

        let progress = ProgressLine::new("markdown", sources.len());
        let failed = sources
            .par_iter()
            .filter(|path| {
                let result = self.build_one(path);
                progress.inc();
                match result {
                    Ok(_) => false,
                    Err(err) => {
                        log!("error"; "{}", err.report());
                        true
                    }
                }
            })
            .count();
        progress.finish();

        Ok(BuildReport {
            built: sources.len() - failed,
            failed,
        })
    }

    /// Render one document into its output unit, overwriting prior output.
    ///
    /// The source is read and rendered before the output tree is touched,
    /// so a failure leaves the previous output in place.
    pub fn build_one(&self, path: &Path) -> Result<PathBuf> {
        let out_dir = self.mapper.to_output_dir(path)?;
        let source = self.mapper.source_path(path)?;

        let content = fs::read(&source).map_err(BuildError::io("read", &source))?;
        let html = self
            .renderer
            .render(&content)
            .map_err(|err| BuildError::Render {
                path: source.clone(),
                message: format!("{err:#}"),
            })?;

        fs::create_dir_all(&out_dir).map_err(BuildError::io("create", &out_dir))?;
        let index = out_dir.join(INDEX_FILE);
        fs::write(&index, html).map_err(BuildError::io("write", &index))?;

        debug!("build"; "{} -> {}", source.display(), index.display());
        Ok(index)
    }

    /// Remove one document's output.
    ///
    /// Deletes the unit's index file, then the unit directory if that left
    /// it empty. Units of other documents nested below it survive
    /// (`guide.md` and `guide/intro.md` share `guide/`). Run the janitor
    /// afterwards for the now-empty ancestors.
    pub fn remove_one(&self, path: &Path) -> Result<()> {
        let index = self.mapper.index_file(path)?;

        match fs::remove_file(&index) {
            Ok(()) => debug!("build"; "removed {}", index.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(BuildError::io("remove", &index)(err)),
        }

        match index.parent() {
            Some(out_dir) => self.remove_unit_dir(out_dir),
            None => Ok(()),
        }
    }

    /// Move one document's rendered output to its new unit without
    /// re-rendering. Falls back to building `to` when there is nothing to
    /// move. Run the janitor afterwards.
    pub fn move_one(&self, from: &Path, to: &Path) -> Result<MoveOutcome> {
        let old_dir = self.mapper.to_output_dir(from)?;
        let new_dir = self.mapper.to_output_dir(to)?;
        let old_index = old_dir.join(INDEX_FILE);

        if old_dir == new_dir || !old_index.is_file() {
            debug!("build"; "nothing to move at {}, rendering", old_index.display());
            return self.build_one(to).map(MoveOutcome::Rebuilt);
        }

        fs::create_dir_all(&new_dir).map_err(BuildError::io("create", &new_dir))?;
        let new_index = new_dir.join(INDEX_FILE);

        match fs::rename(&old_index, &new_index) {
            Ok(()) => {
                debug!("build"; "moved {} -> {}", old_index.display(), new_index.display());
                self.remove_unit_dir(&old_dir)?;
                Ok(MoveOutcome::Relocated(new_index))
            }
            Err(err) => {
                debug!("build"; "rename failed ({}), rendering instead", err);
                let index = self.build_one(to)?;
                self.remove_one(from)?;
                Ok(MoveOutcome::Rebuilt(index))
            }
        }
    }

    /// Prune empty directories left in the output tree.
    pub fn prune(&self) -> PruneReport {
        janitor::prune_empty(self.mapper.output_root())
    }

    fn remove_unit_dir(&self, dir: &Path) -> Result<()> {
        if dir == self.mapper.output_root() {
            return Ok(());
        }
        match fs::remove_dir(dir) {
            Ok(()) => Ok(()),
            Err(err) if janitor::is_benign(&err) => Ok(()),
            Err(err) => Err(BuildError::io("remove", dir)(err)),
        }
    }
}

/// Every markdown document below `root`, sorted. Hidden entries included.
pub fn collect_sources(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .skip_hidden(false)
        .sort(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log!("build"; "failed to access path: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| is_markdown(p))
        .collect()
}
