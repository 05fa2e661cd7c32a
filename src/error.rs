//! Error types for session management.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the session controller and PTY plumbing
#[derive(Debug, Error)]
pub enum SessionError {
    /// Pseudo-terminal allocation or handle cloning failed
    #[error("pty error: {0}")]
    Pty(String),

    /// The agent executable could not be started
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Config file exists but could not be read
    #[error("failed to read config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    pub(crate) fn pty(err: impl std::fmt::Display) -> Self {
        SessionError::Pty(err.to_string())
    }
}
