//! Logging bootstrap for the LiveOCR binary.
//!
//! Diagnostics and heartbeats go to standard output next to the recognized
//! text. A daily log file under `~/.liveocr/logs` keeps a copy when the
//! directory can be created; without it the process still logs to stdout.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "liveocr=info,liveocr_vision=info";
const VERBOSE_LOG_FILTER: &str = "liveocr=debug,liveocr_vision=debug";

/// Logging configuration for the binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

impl<'a> LogConfig<'a> {
    /// Build a config for `app_name`, reading `LIVEOCR_VERBOSE` from the environment.
    pub fn from_env(app_name: &'a str) -> Self {
        let verbose = std::env::var("LIVEOCR_VERBOSE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Self { app_name, verbose }
    }
}

/// Keeps the background file writer alive; drop it only at exit.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber: stdout always, a daily file when possible.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let mut file_guard = None;
    let file_layer = match ensure_logs_dir() {
        Ok(log_dir) => {
            let appender =
                tracing_appender::rolling::daily(log_dir, format!("{}.log", config.app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter.clone()),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to create logs directory: {err:#}");
            None
        }
    };

    let console_filter = console_filter(config.verbose).unwrap_or(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}

// Verbose mode overrides RUST_LOG on the console only.
fn console_filter(verbose: bool) -> Option<EnvFilter> {
    verbose.then(|| EnvFilter::new(VERBOSE_LOG_FILTER))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

/// Get the LiveOCR home directory: ~/.liveocr
///
/// `LIVEOCR_HOME` overrides the location.
pub fn liveocr_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("LIVEOCR_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".liveocr")
}

/// Get the logs directory: ~/.liveocr/logs
pub fn logs_dir() -> PathBuf {
    liveocr_home().join("logs")
}

fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    std::fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}
