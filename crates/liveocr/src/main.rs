//! LiveOCR launcher
//!
//! Loads `liveocr.properties`, authenticates the Vision client, starts the
//! watcher on its own thread and then just waits for SIGINT/SIGTERM.

use anyhow::{Context, Result};
use liveocr::{
    supervise, DirectoryWatcher, LiveOcrConfig, Pipeline, StopReason, SupervisorConfig,
    WatcherControl,
};
use liveocr_logging::{init_logging, LogConfig};
use liveocr_vision::{VisionClient, VisionConfig};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

const SUPERVISOR_TICK: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let _log_guard = match init_logging(LogConfig::from_env("liveocr")) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {e:#}");
            None
        }
    };

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config_path = LiveOcrConfig::default_path();
    let config = LiveOcrConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    info!(config = %config_path.display(), "Configuration loaded");

    let watch_config = config
        .watch_config()
        .context("Invalid screenshot or output directory")?;

    let client = VisionClient::from_key_file(
        &config.key_file,
        VisionConfig {
            timeout: config.ocr_timeout,
            ..VisionConfig::default()
        },
    )
    .with_context(|| format!("Failed to set up OCR client from {}", config.key_file.display()))?;

    let watcher = DirectoryWatcher::register(watch_config.clone())
        .context("Failed to register directory watcher")?;
    let pipeline = Pipeline::from_watch_config(&watch_config, client);

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    install_signal_handlers(Arc::clone(&shutdown_flag))?;

    let handle = WatcherHandle::spawn(watcher, pipeline)?;
    supervise(
        handle,
        &shutdown_flag,
        SupervisorConfig {
            tick: SUPERVISOR_TICK,
            heartbeat: config.heartbeat,
        },
    )?;
    Ok(())
}

fn install_signal_handlers(shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
        std::thread::Builder::new()
            .name("liveocr-signals".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {}, initiating shutdown...", sig);
                    shutdown_flag.store(true, Ordering::SeqCst);
                }
            })
            .context("Failed to spawn signal thread")?;
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, initiating shutdown...");
            shutdown_flag.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    Ok(())
}

struct WatcherHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: JoinHandle<StopReason>,
}

impl WatcherHandle {
    fn spawn(mut watcher: DirectoryWatcher, pipeline: Pipeline<VisionClient>) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join_handle = std::thread::Builder::new()
            .name("liveocr-watcher".to_string())
            .spawn(move || {
                let mut stdout = std::io::stdout();
                watcher.run(&pipeline, &mut stdout, &stop_rx)
            })
            .context("Failed to spawn watcher thread")?;
        Ok(Self {
            stop_tx,
            join_handle,
        })
    }
}

impl WatcherControl for WatcherHandle {
    fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    fn stop(self) -> Result<StopReason> {
        let _ = self.stop_tx.send(());
        self.join_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Watcher thread panicked"))
    }
}
