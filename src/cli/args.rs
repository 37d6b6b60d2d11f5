//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG;

/// Mirror a markdown tree into HTML, serve it, and keep it in sync
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, default_value = DEFAULT_CONFIG, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Path to the content directory [default: ./content]
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub content: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Build once and serve without watching for changes
    #[arg(long)]
    pub no_watch: bool,

    /// Build once and exit without starting the server (wins over --no-watch)
    #[arg(long)]
    pub build_only: bool,
}
