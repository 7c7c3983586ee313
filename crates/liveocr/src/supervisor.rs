//! Idle supervisor for the watcher thread.
//!
//! The main thread does nothing but wait for a shutdown request, printing a
//! heartbeat while it waits. A watcher that stops on its own (its directory
//! went away) is reported once; the process keeps running until killed.

use crate::watcher::StopReason;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// The supervisor's view of a running watcher.
pub trait WatcherControl {
    fn is_finished(&self) -> bool;

    /// Ask the watcher to stop and wait for it.
    fn stop(self) -> Result<StopReason>;
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// Sleep between checks of the shutdown flag
    pub tick: Duration,
    /// Heartbeat interval; `None` disables it
    pub heartbeat: Option<Duration>,
}

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorExit {
    /// Why the watcher stopped, if it was still around to ask.
    pub watcher: Option<StopReason>,
    pub heartbeats: u64,
}

/// Wait until `shutdown_flag` is set, then stop the watcher if it is still running.
pub fn supervise<H: WatcherControl>(
    handle: H,
    shutdown_flag: &AtomicBool,
    config: SupervisorConfig,
) -> Result<SupervisorExit> {
    let mut handle = Some(handle);
    let mut watcher_reason = None;
    let mut heartbeats = 0;
    let mut last_beat = Instant::now();

    while !shutdown_flag.load(Ordering::SeqCst) {
        std::thread::sleep(config.tick);

        if handle.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(finished) = handle.take() {
                let reason = finished.stop()?;
                match reason {
                    StopReason::RegistrationLost => error!(
                        "Watch registration has been lost; no more screenshots will be processed"
                    ),
                    StopReason::Requested => warn!("Watcher thread finished on its own"),
                }
                watcher_reason = Some(reason);
            }
        }

        if let Some(interval) = config.heartbeat {
            if last_beat.elapsed() >= interval {
                info!("Yawn...");
                heartbeats += 1;
                last_beat = Instant::now();
            }
        }
    }

    if let Some(running) = handle.take() {
        info!("Stopping watcher...");
        watcher_reason = Some(running.stop()?);
    }
    info!("Shutdown complete");

    Ok(SupervisorExit {
        watcher: watcher_reason,
        heartbeats,
    })
}
