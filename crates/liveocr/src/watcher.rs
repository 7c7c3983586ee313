//! Directory watcher driving the pipeline.
//!
//! The OS notification facility feeds a channel; [`DirectoryWatcher::run`]
//! drains it in batches, hands every matching creation to the pipeline in
//! delivery order, then re-checks that the registration is still usable.

use crate::config::WatchConfig;
use crate::error::{LiveOcrError, Result};
use crate::pipeline::{self, Pipeline};
use liveocr_vision::TextDetector;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long one blocking wait lasts before the stop channel is checked again.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub type EventReceiver = mpsc::Receiver<notify::Result<Event>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The supervisor asked the watcher to stop.
    Requested,
    /// The watched directory went away or the notifier hung up.
    RegistrationLost,
}

enum Wait {
    Batch {
        events: Vec<notify::Result<Event>>,
        disconnected: bool,
    },
    Stop,
}

pub struct DirectoryWatcher {
    config: WatchConfig,
    events: EventReceiver,
    state: WatchState,
    poll_interval: Duration,
    // Dropping this ends the OS registration.
    _registration: Option<RecommendedWatcher>,
}

impl DirectoryWatcher {
    /// Register for creation events on the source directory.
    pub fn register(config: WatchConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut registration = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        registration
            .watch(&config.source_dir, RecursiveMode::NonRecursive)
            .map_err(|e| LiveOcrError::WatchRegistration {
                path: config.source_dir.clone(),
                reason: e.to_string(),
            })?;

        info!(
            source = %config.source_dir.display(),
            destination = %config.destination_dir.display(),
            "Watching for screenshots"
        );

        let mut watcher = Self::with_events(config, rx);
        watcher._registration = Some(registration);
        Ok(watcher)
    }

    /// Build a watcher fed by an arbitrary event channel.
    pub fn with_events(config: WatchConfig, events: EventReceiver) -> Self {
        Self {
            config,
            events,
            state: WatchState::Running,
            poll_interval: DEFAULT_POLL_INTERVAL,
            _registration: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Process events until stopped.
    ///
    /// Each matching file goes through `pipeline` synchronously, so a slow
    /// detector delays later events but never overlaps with them. Recognized
    /// text is written to `out`.
    pub fn run<D, W>(
        &mut self,
        pipeline: &Pipeline<D>,
        out: &mut W,
        stop_rx: &mpsc::Receiver<()>,
    ) -> StopReason
    where
        D: TextDetector,
        W: Write,
    {
        info!("Watcher loop started");

        while self.state == WatchState::Running {
            let (events, disconnected) = match self.wait(stop_rx) {
                Wait::Stop => {
                    info!("Watcher received stop signal");
                    self.state = WatchState::Stopped;
                    return StopReason::Requested;
                }
                Wait::Batch {
                    events,
                    disconnected,
                } => (events, disconnected),
            };

            for event in events {
                match event {
                    Ok(event) => self.dispatch(&event, pipeline, out),
                    Err(e) => warn!(error = %e, "Notification error"),
                }
            }

            self.state = self.rearm(disconnected);
        }

        StopReason::RegistrationLost
    }

    // Blocks until at least one event is queued, then takes everything else
    // already waiting.
    fn wait(&self, stop_rx: &mpsc::Receiver<()>) -> Wait {
        let first = loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(mpsc::TryRecvError::Disconnected) => return Wait::Stop,
                Err(mpsc::TryRecvError::Empty) => {}
            }

            match self.events.recv_timeout(self.poll_interval) {
                Ok(event) => break event,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if !self.config.source_dir.is_dir() {
                        return Wait::Batch {
                            events: Vec::new(),
                            disconnected: false,
                        };
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Wait::Batch {
                        events: Vec::new(),
                        disconnected: true,
                    };
                }
            }
        };

        let mut events = vec![first];
        let mut disconnected = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        debug!(count = events.len(), "Drained notification batch");
        Wait::Batch {
            events,
            disconnected,
        }
    }

    fn dispatch<D, W>(&self, event: &Event, pipeline: &Pipeline<D>, out: &mut W)
    where
        D: TextDetector,
        W: Write,
    {
        for path in creation_paths(event) {
            let Some(file_name) = self.config.pattern.match_path(path) else {
                continue;
            };
            let outcome = pipeline.process(file_name);
            pipeline::report(&outcome, out);
        }
    }

    fn rearm(&self, disconnected: bool) -> WatchState {
        let source = &self.config.source_dir;
        if disconnected || !source.is_dir() {
            warn!(
                source = %source.display(),
                "Watch registration is no longer valid"
            );
            return WatchState::Stopped;
        }
        WatchState::Running
    }
}

/// Paths in `event` that represent a file appearing in the directory.
pub fn creation_paths(event: &Event) -> Vec<&Path> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(PathBuf::as_path).collect()
        }
        // Backends that cannot tell rename source from target.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| p.exists())
            .collect(),
        _ => Vec::new(),
    }
}
