//! LiveOCR - screenshot watcher with text recognition
//!
//! ```text
//! ┌──────────────┐   create    ┌───────────┐  match   ┌──────────────┐   bytes   ┌────────────┐
//! │ screenshot   │────────────▶│  Watcher  │─────────▶│   Pipeline   │──────────▶│  Detector  │
//! │  directory   │   events    │ (notify)  │          │ move + OCR   │◀──────────│ (Vision)   │
//! └──────────────┘             └───────────┘          └──────────────┘   text    └────────────┘
//! ```
//!
//! One watcher thread handles events strictly in arrival order. Per-file
//! failures are logged and never leave the pipeline. Startup problems stop
//! the process; losing the watch registration only stops the watcher.

pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod supervisor;
pub mod watcher;

pub use config::{LiveOcrConfig, WatchConfig};
pub use error::{LiveOcrError, Result};
pub use matcher::ScreenshotPattern;
pub use pipeline::{OcrResult, Pipeline, PipelineError, Recognition, NO_TEXT_FOUND};
pub use supervisor::{supervise, SupervisorConfig, SupervisorExit, WatcherControl};
pub use watcher::{DirectoryWatcher, StopReason, WatchState};
