//! skriv - mirror a markdown tree into HTML, serve it, and keep it in sync.

mod cli;
mod compiler;
mod config;
mod core;
mod logger;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::SiteConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.debug);

    let config = Arc::new(SiteConfig::load(&cli)?);
    debug!("config"; "{:?}", config);

    if cli.build_only {
        cli::build::build_once(&config)?;
        return Ok(());
    }

    cli::serve::serve(config)
}
