// src/error.rs
//! Error types shared across the inspection and rendering halves.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort the run. Inspectors never surface these; they record
/// warnings and continue. The redaction gate, the privilege preflight, and
/// snapshot loading are the only fatal paths.
#[derive(Error, Debug)]
pub enum Error {
    /// The privilege probe failed and --skip-preflight was not given
    #[error("privilege probe failed: {0}")]
    Privilege(String),

    /// A bridge call exceeded its wall-clock deadline
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The host root mount is missing or unreadable
    #[error("host root {0} is not readable")]
    HostRootUnreadable(PathBuf),

    /// A snapshot file could not be parsed in re-render mode
    #[error("cannot load snapshot from {path}: {reason}")]
    SnapshotLoad { path: PathBuf, reason: String },

    /// A secret pattern survived redaction in the output tree
    #[error("residual secret detected in output: {0}")]
    ResidualSecret(String),

    /// Remote push failed
    #[error("push failed: {0}")]
    Push(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::exec::RunError> for Error {
    fn from(e: crate::exec::RunError) -> Self {
        match e {
            crate::exec::RunError::Timeout(d) => Error::Timeout(d),
            other => Error::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
