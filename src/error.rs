//! Error types for store operations
//!
//! Only store-level failures surface here. Problems with a single link
//! entry are carried on that entry instead of aborting the whole call.

use std::path::{Path, PathBuf};

/// Errors returned by [`crate::Store`] operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("agent store not initialized at {} (run `agentstore init` first)", .0.display())]
    NotInitialized(PathBuf),

    #[error(
        "unknown type {0:?} (valid types: skills, commands, agents, rules, instructions, settings)"
    )]
    UnknownCategory(String),

    #[error("unknown agent {0:?}")]
    UnknownAgent(String),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{kind} {name:?} already exists at {}", .path.display())]
    AlreadyExists {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("unsafe store path {path:?}: {reason}")]
    UnsafePath { path: String, reason: &'static str },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry {}: {message}", .path.display())]
    Registry { path: PathBuf, message: String },

    #[error("config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("git: {0}")]
    Git(#[from] git2::Error),

    #[error("{0}")]
    Unsupported(String),

    #[error("could not lock agent store at {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True when the error is a rejected user input rather than a failure
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Error::UnknownCategory(_)
                | Error::UnknownAgent(_)
                | Error::InvalidName { .. }
                | Error::UnsafePath { .. }
                | Error::Unsupported(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
