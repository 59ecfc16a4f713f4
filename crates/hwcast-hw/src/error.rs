//! Error types for the hwcast hardware library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sampling hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a kernel interface file failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A kernel interface file had unexpected contents.
    #[error("Malformed data in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// The backend was sampled after being closed.
    #[error("Sampler backend is closed")]
    Closed,

    /// Invalid hardware class name.
    #[error("Invalid hardware class: {0}")]
    InvalidClass(String),

    /// Invalid sensor kind name.
    #[error("Invalid sensor kind: {0}")]
    InvalidKind(String),

    /// Backend-specific failure.
    #[error("Sampler error: {0}")]
    Backend(String),
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }
}
