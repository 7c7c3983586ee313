//! Shared fixtures for LiveOCR integration tests.

#![allow(dead_code)]

use liveocr::{ScreenshotPattern, WatchConfig};
use liveocr_vision::{OcrError, Result, TextAnnotation, TextDetector};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// What the spy answers on a given call.
pub enum Reply {
    Texts(Vec<&'static str>),
    NetworkError,
}

/// Detector stub that records every image it receives.
pub struct SpyDetector {
    replies: Mutex<Vec<Reply>>,
    calls: AtomicUsize,
    images: Mutex<Vec<Vec<u8>>>,
}

impl SpyDetector {
    /// Replies are consumed in order; once exhausted, every call returns no text.
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn images(&self) -> Vec<Vec<u8>> {
        self.images.lock().unwrap().clone()
    }
}

impl TextDetector for SpyDetector {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images.lock().unwrap().push(image.to_vec());

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.is_empty() {
            Reply::Texts(Vec::new())
        } else {
            replies.remove(0)
        };
        match reply {
            Reply::Texts(texts) => Ok(texts.into_iter().map(TextAnnotation::new).collect()),
            Reply::NetworkError => Err(OcrError::Decode("connection reset by peer".to_string())),
        }
    }
}

/// A source/destination directory pair under one temp root.
pub struct Workspace {
    _root: TempDir,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp root");
        let source = root.path().join("desktop");
        let destination = root.path().join("screenshots");
        std::fs::create_dir(&source).expect("create source dir");
        std::fs::create_dir(&destination).expect("create destination dir");
        Self {
            _root: root,
            source,
            destination,
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            source_dir: self.source.clone(),
            destination_dir: self.destination.clone(),
            pattern: ScreenshotPattern::new().expect("compile pattern"),
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    check()
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}
