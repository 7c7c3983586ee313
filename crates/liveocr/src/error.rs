//! Startup error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent the watcher from starting.
#[derive(Error, Debug)]
pub enum LiveOcrError {
    #[error("Failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Missing required config key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid value for config key '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Cannot watch {}: {reason}", path.display())]
    WatchRegistration { path: PathBuf, reason: String },

    #[error("Notification facility error")]
    Notify(#[from] notify::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LiveOcrError>;
