//! Drives the real notification facility on temp directories.

mod support;

use liveocr::{DirectoryWatcher, Pipeline, StopReason};
use std::fs;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use support::{wait_until, Reply, SpyDetector, Workspace};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Running {
    stop_tx: mpsc::Sender<()>,
    join: thread::JoinHandle<(StopReason, Vec<u8>)>,
}

fn start(ws: &Workspace, detector: Arc<SpyDetector>) -> Running {
    let watcher = DirectoryWatcher::register(ws.watch_config()).expect("register watcher");
    let pipeline = Pipeline::from_watch_config(watcher.config(), detector);
    let (stop_tx, stop_rx) = mpsc::channel();
    let join = thread::spawn(move || {
        let mut watcher = watcher.with_poll_interval(Duration::from_millis(20));
        let mut out = Vec::new();
        let reason = watcher.run(&pipeline, &mut out, &stop_rx);
        (reason, out)
    });
    Running { stop_tx, join }
}

impl Running {
    fn stop(self) -> (StopReason, String) {
        self.stop_tx.send(()).unwrap();
        let (reason, out) = self.join.join().expect("watcher thread");
        (reason, String::from_utf8(out).unwrap())
    }
}

#[test]
fn moves_only_matching_files() {
    let ws = Workspace::new();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["Hello", "Hello world"])]));
    let running = start(&ws, Arc::clone(&detector));

    let shot = "Screen Shot 2020-01-01 at 1.02.03 AM.png";
    fs::write(ws.source.join(shot), b"png").unwrap();
    fs::write(ws.source.join("notes.txt"), b"decoy").unwrap();

    let moved = ws.destination.join(shot);
    assert!(wait_until(TIMEOUT, || moved.exists() && detector.calls() >= 1));
    thread::sleep(Duration::from_millis(300));

    let (reason, out) = running.stop();
    assert_eq!(reason, StopReason::Requested);
    assert_eq!(detector.calls(), 1);
    assert_eq!(out, "Hello world\n");
    assert!(!ws.source.join(shot).exists());
    assert!(ws.source.join("notes.txt").exists());
    assert!(!ws.destination.join("notes.txt").exists());
}

#[test]
fn screenshot_renamed_into_directory_is_moved_intact() {
    let ws = Workspace::new();
    let staging = tempfile::TempDir::new_in(ws.source.parent().unwrap()).unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["staged"])]));
    let running = start(&ws, Arc::clone(&detector));

    let shot = "Screen Shot 2020-01-01 at 11.22.33 PM.png";
    let staged = staging.path().join(shot);
    fs::write(&staged, b"complete image").unwrap();
    fs::rename(&staged, ws.source.join(shot)).unwrap();

    let moved = ws.destination.join(shot);
    assert!(wait_until(TIMEOUT, || detector.calls() >= 1));

    let (_, out) = running.stop();
    assert_eq!(fs::read(&moved).unwrap(), b"complete image");
    assert_eq!(detector.images(), vec![b"complete image".to_vec()]);
    assert_eq!(out, "staged\n");
}

#[test]
fn missing_directory_fails_registration() {
    let ws = Workspace::new();
    let mut config = ws.watch_config();
    config.source_dir = ws.source.join("does-not-exist");

    assert!(DirectoryWatcher::register(config).is_err());
}
