//! Text detection collaborator for LiveOCR.
//!
//! The watcher only needs one thing from an OCR backend: hand over the bytes
//! of an image and get back a list of text annotations. That shape is the
//! [`TextDetector`] trait; [`VisionClient`] implements it against the Google
//! Cloud Vision REST API using a service-account key file.

pub mod client;
pub mod credentials;
pub mod error;

use std::sync::Arc;

pub use client::{VisionClient, VisionConfig, VisionEndpoints};
pub use credentials::ServiceAccountKey;
pub use error::{OcrError, Result};

/// One text candidate returned by the OCR backend for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAnnotation {
    pub text: String,
    pub locale: Option<String>,
}

impl TextAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            locale: None,
        }
    }

    /// Length in characters, used to rank candidates.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Synchronous text detection over raw image bytes.
///
/// Implementations are constructed once and reused for every image, so they
/// must tolerate sequential reuse from the watcher thread.
pub trait TextDetector: Send + Sync {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>>;
}

impl<T: TextDetector + ?Sized> TextDetector for Arc<T> {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>> {
        (**self).detect_text(image)
    }
}

impl<T: TextDetector + ?Sized> TextDetector for Box<T> {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>> {
        (**self).detect_text(image)
    }
}
