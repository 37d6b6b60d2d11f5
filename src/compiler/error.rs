//! Errors of the build engine.
//!
//! Every variant is scoped to one document: callers log it and move on.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Path cannot be related to the content directory.
    #[error("`{}` is outside the content directory `{}`", path.display(), root.display())]
    OutOfScope { path: PathBuf, root: PathBuf },

    #[error("failed to {action} `{}`", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render `{}`: {message}", path.display())]
    Render { path: PathBuf, message: String },
}

impl BuildError {
    /// Adapter for `map_err`: `fs::read(p).map_err(BuildError::io("read", p))`.
    pub fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }

    /// One-line message including the underlying cause.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_includes_cause() {
        let err = BuildError::io("read", Path::new("/src/a.md"))(io::Error::new(
            io::ErrorKind::NotFound,
            "gone",
        ));
        assert_eq!(err.report(), "failed to read `/src/a.md`: gone");
    }
}
