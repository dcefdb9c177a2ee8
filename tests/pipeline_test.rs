//! Integration tests for routing, retry draining and spooling.

mod common;

use activity_capture_agent::delivery::Routed;
use activity_capture_agent::{
    create_shared_stats, ActivityRecorder, ActivityWindow, AnomalyFilter, ArtifactNamer,
    DeliveryQueue, Dispatcher, Spool, Uploader,
};
use common::{switch_probe, MemoryStore};
use std::sync::atomic::Ordering;

fn screenshot(n: u8) -> activity_capture_agent::Artifact {
    ArtifactNamer::default().screenshot(vec![n; 4])
}

#[test]
fn test_offline_artifact_is_queued_then_drained_once() {
    let store = MemoryStore::new();
    let (online, probe) = switch_probe(false);
    let stats = create_shared_stats();
    let dispatcher = Dispatcher::new(probe, store.clone(), DeliveryQueue::new(), stats.clone());

    let artifact = screenshot(1);
    let key = artifact.key().to_string();
    assert_eq!(dispatcher.route(artifact), Routed::Queued);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.queue().keys(), vec![key.clone()]);

    online.store(true, Ordering::SeqCst);
    let report = dispatcher.flush();
    assert_eq!(report.delivered, 1);
    assert!(!report.requeued);
    assert!(dispatcher.queue().is_empty());
    assert_eq!(store.keys(), vec![key]);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.artifacts_queued, 1);
    assert_eq!(snapshot.artifacts_delivered, 1);
}

#[test]
fn test_failed_delivery_is_queued_exactly_once() {
    let store = MemoryStore::new();
    store.fail_next(1);
    let (_online, probe) = switch_probe(true);
    let dispatcher = Dispatcher::new(
        probe,
        store.clone(),
        DeliveryQueue::new(),
        create_shared_stats(),
    );

    let artifact = screenshot(2);
    let key = artifact.key().to_string();
    assert_eq!(dispatcher.route(artifact), Routed::Queued);
    assert_eq!(dispatcher.queue().keys(), vec![key.clone()]);

    assert_eq!(dispatcher.flush().delivered, 1);
    assert!(dispatcher.queue().is_empty());
    assert_eq!(store.keys(), vec![key]);
}

#[test]
fn test_single_failure_stops_the_drain() {
    let store = MemoryStore::new();
    let queue = DeliveryQueue::new();
    let uploader = Uploader::new(store.clone(), create_shared_stats());

    let artifacts: Vec<_> = (0..3).map(screenshot).collect();
    let keys: Vec<String> = artifacts.iter().map(|a| a.key().to_string()).collect();
    queue.extend(artifacts);

    store.fail_next(1);
    let report = queue.drain_attempt(&uploader);
    assert_eq!(report.delivered, 0);
    assert!(report.requeued);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    // Head moved to the tail
    assert_eq!(
        queue.keys(),
        vec![keys[1].clone(), keys[2].clone(), keys[0].clone()]
    );

    let report = queue.drain_attempt(&uploader);
    assert_eq!(report.delivered, 3);
    assert!(queue.is_empty());
}

#[test]
fn test_no_queued_artifact_is_lost() {
    let store = MemoryStore::new();
    let queue = DeliveryQueue::new();
    let uploader = Uploader::new(store.clone(), create_shared_stats());

    let artifacts: Vec<_> = (0..10).map(screenshot).collect();
    let mut expected: Vec<String> = artifacts.iter().map(|a| a.key().to_string()).collect();
    queue.extend(artifacts);

    store.set_failing(true);
    for _ in 0..5 {
        queue.drain_attempt(&uploader);
        assert_eq!(queue.len(), 10);
    }

    store.set_failing(false);
    store.fail_next(3);
    let mut rounds = 0;
    while !queue.is_empty() {
        queue.drain_attempt(&uploader);
        rounds += 1;
        assert!(rounds < 20, "queue never drained");
    }

    let mut delivered = store.keys();
    delivered.sort();
    expected.sort();
    assert_eq!(delivered, expected);
}

#[test]
fn test_queue_survives_restart_through_spool() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path().join("spool"));

    let queue = DeliveryQueue::new();
    queue.enqueue(screenshot(7));
    queue.enqueue(ArtifactNamer::default().activity_log(&ActivityWindow::from_parts(vec![], vec![])));
    let keys = queue.keys();

    spool.save(&queue.take_all()).unwrap();
    assert!(queue.is_empty());
    assert_eq!(spool.pending(), 2);

    let restarted = DeliveryQueue::new();
    restarted.extend(spool.load().unwrap());
    assert_eq!(restarted.keys(), keys);

    // Killed before anything was delivered: the next start restores it all again
    let after_crash = DeliveryQueue::new();
    after_crash.extend(spool.load().unwrap());
    assert_eq!(after_crash.keys(), keys);

    // Head delivered and checkpointed, then a clean shutdown with nothing left
    let mut remaining = restarted.take_all();
    remaining.remove(0);
    spool.save(&remaining).unwrap();
    assert_eq!(spool.pending(), 1);
    spool.save(&[]).unwrap();
    assert_eq!(spool.pending(), 0);
}

#[test]
fn test_corrupt_spool_manifest_is_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let spool_dir = dir.path().join("spool");
    std::fs::create_dir_all(&spool_dir).unwrap();
    std::fs::write(spool_dir.join("manifest.json"), "{not json").unwrap();

    let spool = Spool::new(&spool_dir);
    assert_eq!(spool.pending(), 0);
    let err = spool.load().unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn test_recorded_window_feeds_filter_and_namer() {
    let recorder = ActivityRecorder::new();
    let filter = AnomalyFilter::default();

    for (x, y) in [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)] {
        recorder.on_pointer_move(x, y);
    }
    assert!(filter.is_irregular(&recorder.drain_window()));

    for (x, y) in [(0.0, 0.0), (1.0, 1.0), (5.0, 9.0)] {
        recorder.on_pointer_move(x, y);
    }
    recorder.on_key_press();
    let window = recorder.drain_window();
    assert!(!filter.is_irregular(&window));

    let artifact = ArtifactNamer::default().activity_log(&window);
    assert!(artifact.key().starts_with("logs/activity_log_"));
    assert!(artifact.key().ends_with(".txt"));
    let text = String::from_utf8(artifact.payload().to_vec()).unwrap();
    assert!(text.starts_with("Mouse movements: [(0, 0), (1, 1), (5, 9)]\nKey presses: ["));
}

#[test]
fn test_concurrent_routing_from_two_loops() {
    let store = MemoryStore::new();
    let (online, probe) = switch_probe(false);
    let dispatcher = Dispatcher::new(
        probe,
        store.clone(),
        DeliveryQueue::new(),
        create_shared_stats(),
    );

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || {
                for n in 0..50 {
                    dispatcher.route(screenshot(n));
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(dispatcher.queue().len(), 100);

    online.store(true, Ordering::SeqCst);
    let report = dispatcher.flush();
    assert_eq!(report.delivered, 100);
    assert_eq!(store.keys().len(), 100);
}
