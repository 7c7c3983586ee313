//! Move-and-recognize step for one matched screenshot.

use crate::config::WatchConfig;
use liveocr_vision::{OcrError, TextAnnotation, TextDetector};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Printed when the detector finds no text at all.
pub const NO_TEXT_FOUND: &str = "No text found?";

/// Why one screenshot could not be handled. Never fatal to the watcher.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Failed to move {} -> {}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Text recognition failed for {}", path.display())]
    Recognition {
        path: PathBuf,
        #[source]
        source: OcrError,
    },
}

impl PipelineError {
    /// True when the file never left the source directory.
    pub fn is_move_failure(&self) -> bool {
        matches!(self, Self::DestinationExists { .. } | Self::Move { .. })
    }
}

/// Text picked for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrResult {
    pub recognized_text: String,
    pub found: bool,
}

impl OcrResult {
    /// Keep the longest annotation. The detector usually returns one
    /// whole-image transcription followed by per-word pieces.
    pub fn from_annotations(annotations: &[TextAnnotation]) -> Self {
        match select_longest(annotations) {
            Some(best) => Self {
                recognized_text: best.text.clone(),
                found: true,
            },
            None => Self {
                recognized_text: String::new(),
                found: false,
            },
        }
    }

    /// What gets printed for this result.
    pub fn display_text(&self) -> &str {
        if self.found {
            &self.recognized_text
        } else {
            NO_TEXT_FOUND
        }
    }
}

/// Longest annotation by character count; the first one wins a tie.
pub fn select_longest(annotations: &[TextAnnotation]) -> Option<&TextAnnotation> {
    annotations.iter().fold(None, |best: Option<&TextAnnotation>, candidate| match best {
        Some(current) if current.char_len() >= candidate.char_len() => Some(current),
        _ => Some(candidate),
    })
}

/// A screenshot that was moved and sent through the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub destination: PathBuf,
    pub result: OcrResult,
}

pub struct Pipeline<D> {
    source_dir: PathBuf,
    destination_dir: PathBuf,
    detector: D,
}

impl<D: TextDetector> Pipeline<D> {
    pub fn new(source_dir: PathBuf, destination_dir: PathBuf, detector: D) -> Self {
        Self {
            source_dir,
            destination_dir,
            detector,
        }
    }

    pub fn from_watch_config(config: &WatchConfig, detector: D) -> Self {
        Self::new(
            config.source_dir.clone(),
            config.destination_dir.clone(),
            detector,
        )
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Move `file_name` from the source to the destination directory.
    ///
    /// Refuses to replace an existing destination file.
    pub fn move_screenshot(&self, file_name: &str) -> Result<PathBuf, PipelineError> {
        let from = self.source_dir.join(file_name);
        let to = self.destination_dir.join(file_name);
        tracing::info!("Moving: {} -> {}", from.display(), to.display());

        match move_no_clobber(&from, &to) {
            Ok(()) => Ok(to),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(PipelineError::DestinationExists { path: to })
            }
            Err(source) => Err(PipelineError::Move { from, to, source }),
        }
    }

    /// Run text detection on the file at `path`.
    pub fn recognize(&self, path: &Path) -> Result<OcrResult, PipelineError> {
        let image = fs::read(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let annotations = self
            .detector
            .detect_text(&image)
            .map_err(|source| PipelineError::Recognition {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(
            path = %path.display(),
            annotations = annotations.len(),
            "Detector returned annotations"
        );
        Ok(OcrResult::from_annotations(&annotations))
    }

    /// Move, then recognize. Detection is skipped when the move fails.
    pub fn process(&self, file_name: &str) -> Result<Recognition, PipelineError> {
        let destination = self.move_screenshot(file_name)?;
        let result = self.recognize(&destination)?;
        Ok(Recognition {
            destination,
            result,
        })
    }
}

/// Print a recognition or log a failure. Never propagates anything.
pub fn report<W: Write>(outcome: &Result<Recognition, PipelineError>, out: &mut W) {
    match outcome {
        Ok(recognition) => {
            tracing::info!(
                path = %recognition.destination.display(),
                found = recognition.result.found,
                "Recognition finished"
            );
            let written = writeln!(out, "{}", recognition.result.display_text())
                .and_then(|()| out.flush());
            if let Err(e) = written {
                tracing::warn!(error = %e, "Failed to write recognized text");
            }
        }
        Err(err) => {
            tracing::error!(
                move_failed = err.is_move_failure(),
                "{}",
                format_error_chain(err)
            );
        }
    }
}

/// Render an error and its sources, one cause per line.
pub fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\n    caused by: {cause}");
        source = cause.source();
    }
    rendered
}

// A hard link fails atomically with AlreadyExists when `to` is taken, so two
// movers racing for the same name cannot overwrite each other.
fn move_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => remove_source(from, to, |p| fs::remove_file(p)),
        Err(e) if is_cross_device(&e) => copy_then_remove(from, to),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound
            ) =>
        {
            Err(e)
        }
        // No hard links on this filesystem. The check and the rename are not
        // atomic here: a file created in between is overwritten.
        Err(_) => rename_unless_exists(from, to),
    }
}

fn rename_unless_exists(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => copy_then_remove(from, to),
        Err(e) => Err(e),
    }
}

// Different volumes: copy into a file that must not exist yet, then drop the source.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    copy_then_remove_with(from, to, |p| fs::remove_file(p))
}

fn copy_then_remove_with<F>(from: &Path, to: &Path, remove: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let mut reader = fs::File::open(from)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;
    if let Err(e) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(e);
    }
    drop(writer);
    remove_source(from, to, remove)
}

// Once `to` holds the data, `from` has to go. If it cannot, undo `to` so the
// screenshot is not left in both places.
fn remove_source<F>(from: &Path, to: &Path, remove: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if let Err(e) = remove(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }

    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}
