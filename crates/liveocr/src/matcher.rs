//! Screenshot filename matching.

use regex::Regex;
use std::path::Path;

/// macOS default screenshot names, e.g. `Screen Shot 2018-02-12 at 9.39.04 PM.png`.
pub const SCREENSHOT_PATTERN: &str =
    r"^Screen Shot \d{4}-\d{2}-\d{2} at \d{1,2}\.\d{2}\.\d{2} (AM|PM)\.png$";

/// Compiled whole-name screenshot matcher.
#[derive(Debug, Clone)]
pub struct ScreenshotPattern {
    regex: Regex,
}

impl ScreenshotPattern {
    pub fn new() -> crate::Result<Self> {
        Self::from_pattern(SCREENSHOT_PATTERN)
    }

    /// Build a matcher from an arbitrary regular expression.
    pub fn from_pattern(pattern: &str) -> crate::Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    /// Match only the final segment of `path`. Returns the file name on success.
    pub fn match_path<'a>(&self, path: &'a Path) -> Option<&'a str> {
        let name = path.file_name()?.to_str()?;
        self.is_match(name).then_some(name)
    }
}
