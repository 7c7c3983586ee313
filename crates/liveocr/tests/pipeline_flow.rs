mod support;

use liveocr::{DirectoryWatcher, Pipeline, StopReason, NO_TEXT_FOUND};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::fs;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use support::{Reply, SpyDetector, Workspace};

const FIRST: &str = "Screen Shot 2018-02-12 at 9.39.04 PM.png";
const SECOND: &str = "Screen Shot 2018-02-12 at 10.01.59 PM.png";

fn created(path: std::path::PathBuf) -> notify::Result<Event> {
    Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(path))
}

/// Queue `events`, close the channel, and run the loop to completion.
fn run_queued(
    ws: &Workspace,
    detector: Arc<SpyDetector>,
    events: Vec<notify::Result<Event>>,
) -> (StopReason, String) {
    let (events_tx, events_rx) = mpsc::channel();
    for event in events {
        events_tx.send(event).unwrap();
    }
    drop(events_tx);

    let (_stop_tx, stop_rx) = mpsc::channel();
    let mut watcher = DirectoryWatcher::with_events(ws.watch_config(), events_rx)
        .with_poll_interval(Duration::from_millis(10));
    let pipeline = Pipeline::from_watch_config(watcher.config(), detector);

    let mut out = Vec::new();
    let reason = watcher.run(&pipeline, &mut out, &stop_rx);
    (reason, String::from_utf8(out).unwrap())
}

#[test]
fn recognition_failure_does_not_block_next_event() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"first").unwrap();
    fs::write(ws.source.join(SECOND), b"second").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![
        Reply::NetworkError,
        Reply::Texts(vec!["abc", "abcdef", "ab"]),
    ]));

    let (reason, out) = run_queued(
        &ws,
        Arc::clone(&detector),
        vec![created(ws.source.join(FIRST)), created(ws.source.join(SECOND))],
    );

    assert_eq!(reason, StopReason::RegistrationLost);
    assert_eq!(detector.calls(), 2);
    assert_eq!(out, "abcdef\n");
    assert!(ws.destination.join(FIRST).exists());
    assert!(ws.destination.join(SECOND).exists());
    assert_eq!(detector.images(), vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn empty_detection_prints_indicator() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"blank").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec![])]));

    let (_, out) = run_queued(&ws, Arc::clone(&detector), vec![created(ws.source.join(FIRST))]);

    assert_eq!(out, format!("{NO_TEXT_FOUND}\n"));
    assert_eq!(detector.calls(), 1);
}

#[test]
fn unmatched_names_are_ignored() {
    let ws = Workspace::new();
    for name in ["notes.txt", "Screen Shot 2018-02-12 at 9.39.04 PM.jpg", "Screenshot.png"] {
        fs::write(ws.source.join(name), b"x").unwrap();
    }
    let detector = Arc::new(SpyDetector::new(vec![]));

    let (_, out) = run_queued(
        &ws,
        Arc::clone(&detector),
        vec![
            created(ws.source.join("notes.txt")),
            created(ws.source.join("Screen Shot 2018-02-12 at 9.39.04 PM.jpg")),
            created(ws.source.join("Screenshot.png")),
        ],
    );

    assert!(out.is_empty());
    assert_eq!(detector.calls(), 0);
    assert!(ws.source.join("notes.txt").exists());
    assert_eq!(fs::read_dir(&ws.destination).unwrap().count(), 0);
}

#[test]
fn duplicate_delivery_fails_move_without_detection() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"once").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["hello"])]));

    let (_, out) = run_queued(
        &ws,
        Arc::clone(&detector),
        vec![created(ws.source.join(FIRST)), created(ws.source.join(FIRST))],
    );

    assert_eq!(out, "hello\n");
    assert_eq!(detector.calls(), 1);
    assert_eq!(fs::read(ws.destination.join(FIRST)).unwrap(), b"once");
}

#[test]
fn name_collision_leaves_both_files_alone() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"new").unwrap();
    fs::write(ws.destination.join(FIRST), b"old").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["never"])]));

    let (_, out) = run_queued(&ws, Arc::clone(&detector), vec![created(ws.source.join(FIRST))]);

    assert!(out.is_empty());
    assert_eq!(detector.calls(), 0);
    assert_eq!(fs::read(ws.source.join(FIRST)).unwrap(), b"new");
    assert_eq!(fs::read(ws.destination.join(FIRST)).unwrap(), b"old");
}

#[test]
fn rename_into_directory_counts_as_creation() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"renamed").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["moved in"])]));
    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
        .add_path(ws.source.join(FIRST));

    let (_, out) = run_queued(&ws, Arc::clone(&detector), vec![Ok(event)]);

    assert_eq!(out, "moved in\n");
    assert!(!ws.source.join(FIRST).exists());
}

#[test]
fn notification_errors_are_skipped() {
    let ws = Workspace::new();
    fs::write(ws.source.join(FIRST), b"ok").unwrap();
    let detector = Arc::new(SpyDetector::new(vec![Reply::Texts(vec!["after error"])]));

    let (_, out) = run_queued(
        &ws,
        Arc::clone(&detector),
        vec![
            Err(notify::Error::generic("queue overflow")),
            created(ws.source.join(FIRST)),
        ],
    );

    assert_eq!(out, "after error\n");
}
