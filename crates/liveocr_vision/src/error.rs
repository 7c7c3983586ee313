//! Error types for the Vision client

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// OCR collaborator error type
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to read key file {}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Failed to sign token assertion")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("Token request rejected ({status}): {message}")]
    Token { status: u16, message: String },

    #[error("Vision API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, OcrError>;
