//! Full builds from the command line.

use std::time::Instant;

use anyhow::{Context, Result};

use crate::compiler::{BuildReport, Builder, MarkdownRenderer, PathMapper, Render};
use crate::config::SiteConfig;
use crate::log;

/// `--build-only`: render the whole source tree once.
pub fn build_once(config: &SiteConfig) -> Result<BuildReport> {
    let builder = Builder::new(PathMapper::new(config), MarkdownRenderer::default());
    full_build(&builder)
}

/// Run a full build and log its outcome.
///
/// Only failing to reset the output root is an error; documents that fail
/// to render are reported and skipped.
pub fn full_build<R: Render>(builder: &Builder<R>) -> Result<BuildReport> {
    let started = Instant::now();
    let mapper = builder.mapper();
    log!(
        "build";
        "{} -> {}",
        mapper.source_root().display(),
        mapper.output_root().display()
    );

    let report = builder.full_build().with_context(|| {
        format!(
            "failed to prepare output directory `{}`",
            mapper.output_root().display()
        )
    })?;

    if report.failed > 0 {
        log!(
            "warning";
            "{} of {} documents failed to render",
            report.failed,
            report.total()
        );
    }
    log!(
        "build";
        "{} documents built in {:.2?}",
        report.built,
        started.elapsed()
    );

    Ok(report)
}
