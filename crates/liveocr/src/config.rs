//! Configuration for LiveOCR
//!
//! Settings come from a Java-style `.properties` file, by default
//! `./liveocr.properties`. `LIVEOCR_CONFIG` points somewhere else.

use crate::error::{LiveOcrError, Result};
use crate::matcher::ScreenshotPattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "liveocr.properties";
pub const CONFIG_PATH_ENV: &str = "LIVEOCR_CONFIG";

const KEY_SCREENSHOT_PATH: &str = "screenshotPath";
const KEY_OUTPUT_PATH: &str = "outputPath";
const KEY_KEY_FILE: &str = "keyFile";
const KEY_OCR_TIMEOUT: &str = "ocrTimeoutSecs";
const KEY_HEARTBEAT: &str = "heartbeatSecs";

const DEFAULT_OCR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HEARTBEAT_SECS: u64 = 10;

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveOcrConfig {
    /// Directory watched for new screenshots
    pub screenshot_path: PathBuf,
    /// Directory matched screenshots are moved into
    pub output_path: PathBuf,
    /// Service-account key file for the Vision API
    pub key_file: PathBuf,
    /// Upper bound for one OCR request
    pub ocr_timeout: Duration,
    /// Interval of the idle heartbeat; `None` when disabled
    pub heartbeat: Option<Duration>,
}

impl LiveOcrConfig {
    /// Resolve the properties file location from the environment.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".").join(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from a properties file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LiveOcrError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_properties(&parse_properties(&content))
    }

    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            screenshot_path: required_path(props, KEY_SCREENSHOT_PATH)?,
            output_path: required_path(props, KEY_OUTPUT_PATH)?,
            key_file: required_path(props, KEY_KEY_FILE)?,
            ocr_timeout: match optional_secs(props, KEY_OCR_TIMEOUT)? {
                Some(0) => {
                    return Err(LiveOcrError::InvalidValue {
                        key: KEY_OCR_TIMEOUT,
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Some(secs) => Duration::from_secs(secs),
                None => Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
            },
            heartbeat: match optional_secs(props, KEY_HEARTBEAT)?.unwrap_or(DEFAULT_HEARTBEAT_SECS) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }

    /// Check that both directories exist and build the watch configuration.
    pub fn watch_config(&self) -> Result<WatchConfig> {
        ensure_dir(&self.screenshot_path)?;
        ensure_dir(&self.output_path)?;
        Ok(WatchConfig {
            source_dir: self.screenshot_path.clone(),
            destination_dir: self.output_path.clone(),
            pattern: ScreenshotPattern::new()?,
        })
    }
}

/// What the watcher needs: where to look, where to move, what to accept.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub pattern: ScreenshotPattern,
}

fn ensure_dir(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(LiveOcrError::WatchRegistration {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(LiveOcrError::WatchRegistration {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn required_path(props: &HashMap<String, String>, key: &'static str) -> Result<PathBuf> {
    match props.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(LiveOcrError::MissingKey(key)),
    }
}

fn optional_secs(props: &HashMap<String, String>, key: &'static str) -> Result<Option<u64>> {
    let Some(raw) = props.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|e| LiveOcrError::InvalidValue {
            key,
            reason: format!("'{raw}' is not a whole number of seconds ({e})"),
        })
}

/// Parse `.properties` text into a key/value map.
///
/// Supports `=`, `:` and whitespace separators, `#`/`!` comments, backslash
/// line continuations and the usual escapes including `\uXXXX`.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let first = line.trim_start();
        if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
            continue;
        }

        let mut logical = String::from(first);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        props.insert(unescape(key), unescape(value));
    }

    props
}

// An odd number of trailing backslashes means the last one escapes the newline.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\x0c']);
    }
    (key, rest)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
