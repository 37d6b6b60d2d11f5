//! Site configuration management for `skriv.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [build] and [serve]
//! ├── error.rs       # ConfigError
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! The config file is optional. Without one, the project root is the
//! current directory and every setting takes its default. The finished
//! `SiteConfig` is immutable and shared as `Arc<SiteConfig>`.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{BuildSectionConfig, ServeConfig};

use crate::{cli::Cli, log, utils::path::canonicalize_existing_prefix};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Config file name looked up when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "skriv.toml";

/// Root configuration structure representing skriv.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file, empty when none was found
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of the config file, or cwd
    #[serde(skip)]
    pub root: PathBuf,

    /// Working directory at startup; relative event paths resolve against it
    #[serde(skip)]
    pub cwd: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildSectionConfig,

    /// Server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file. A missing default
    /// config is fine; a missing explicit `--config` is an error.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config, &cwd) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                config.config_path = path;
                config
            }
            None if cli.config != Path::new(DEFAULT_CONFIG) => {
                bail!(ConfigError::Validation(format!(
                    "config file `{}` not found",
                    cli.config.display()
                )));
            }
            None => Self {
                root: cwd.clone(),
                ..Self::default()
            },
        };

        config.cwd = cwd;
        config.apply_cli(cli);
        config.normalize_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "ignoring unknown fields in {}: {}", name, ignored.join(", "));
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// CLI flags win over the config file.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(content) = &cli.content {
            // Relative to where the user typed it, not to the config file
            self.build.content = self.cwd.join(content);
        }
        if cli.no_watch || cli.build_only {
            self.serve.watch = false;
        }
    }

    /// Resolve `build.content` and `build.output` to absolute paths.
    ///
    /// The content directory must exist; it is canonicalized so that watch
    /// events (which report canonical paths on some platforms) relate to it.
    fn normalize_paths(&mut self) -> Result<()> {
        let content = self.root.join(&self.build.content);
        self.build.content = content.canonicalize().map_err(|err| {
            ConfigError::Validation(format!(
                "content directory `{}` is not accessible: {err}",
                content.display()
            ))
        })?;

        let output = if self.build.output.as_os_str().is_empty() {
            BuildSectionConfig::default_output_for(&self.build.content)
        } else {
            self.root.join(&self.build.output)
        };
        self.build.output = canonicalize_existing_prefix(&output).unwrap_or(output);

        Ok(())
    }

    /// Validate resolved paths.
    ///
    /// The output tree is wiped on every start and the content tree is
    /// watched, so neither may contain the other.
    pub fn validate(&self) -> Result<()> {
        let content = self.content_dir();
        let output = self.output_dir();

        if !content.is_dir() {
            bail!(ConfigError::Validation(format!(
                "content path `{}` is not a directory",
                content.display()
            )));
        }
        if output == content {
            bail!(ConfigError::Validation(
                "build.output must differ from build.content".into()
            ));
        }
        if output.starts_with(content) {
            bail!(ConfigError::Validation(format!(
                "build.output `{}` is inside the content directory",
                output.display()
            )));
        }
        if content.starts_with(output) {
            bail!(ConfigError::Validation(format!(
                "build.output `{}` contains the content directory and would be wiped",
                output.display()
            )));
        }

        Ok(())
    }

    /// Absolute markdown source root
    pub fn content_dir(&self) -> &Path {
        &self.build.content
    }

    /// Absolute rendered output root
    pub fn output_dir(&self) -> &Path {
        &self.build.output
    }

    /// Config for already-absolute directories, bypassing file lookup.
    #[cfg(test)]
    pub fn for_dirs(content: &Path, output: &Path) -> Self {
        let mut config = Self::default();
        config.build.content = content.to_path_buf();
        config.build.output = output.to_path_buf();
        config.cwd = content.parent().map(Path::to_path_buf).unwrap_or_default();
        config.root = config.cwd.clone();
        config
    }
}

/// Find config file by searching upward from `cwd`
fn find_config_file(config_name: &Path, cwd: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    cwd.ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}
