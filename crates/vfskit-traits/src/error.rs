//! Error types for virtual filesystem operations.

use std::io;

/// Error type for virtual filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("unsupported")]
    Unsupported,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a new invalid-path error.
    pub fn invalid_path<S: Into<String>>(path: S) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Map an I/O error onto the dedicated variant for its kind, if one
    /// exists, so callers can match on error kinds across backends.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::AccessDenied,
            _ => Self::Io(err),
        }
    }
}
