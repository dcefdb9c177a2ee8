//! Integration tests for the capture loops and control surface.

mod common;

use activity_capture_agent::{
    create_shared_stats, ActivityRecorder, Agent, AgentComponents, AnomalyFilter, ArtifactNamer,
    CaptureOptions, DeliveryQueue, Dispatcher, SharedSettings, TrackerSettings,
};
use common::{switch_probe, wait_until, FakeScreen, MemoryStore, ScriptedInput};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PATIENCE: Duration = Duration::from_secs(6);

struct Harness {
    agent: Agent,
    store: Arc<MemoryStore>,
    online: Arc<AtomicBool>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

fn harness(input: ScriptedInput, capture_screenshots: bool) -> Harness {
    let store = MemoryStore::new();
    let (online, probe) = switch_probe(true);
    let stats = create_shared_stats();
    let starts = input.starts.clone();
    let stops = input.stops.clone();

    let agent = Agent::new(AgentComponents {
        settings: SharedSettings::new(TrackerSettings {
            activity_interval_secs: 1,
            screenshot_interval_mins: 1,
            capture_screenshots,
            capture_blurred: false,
        }),
        dispatcher: Dispatcher::new(probe, store.clone(), DeliveryQueue::new(), stats.clone()),
        recorder: ActivityRecorder::new(),
        input: Box::new(input),
        screen: Arc::new(FakeScreen),
        filter: AnomalyFilter::default(),
        namer: ArtifactNamer::default(),
        capture_options: CaptureOptions::default(),
        stats,
    });

    Harness {
        agent,
        store,
        online,
        starts,
        stops,
    }
}

fn log_bodies(store: &MemoryStore) -> Vec<String> {
    store
        .keys_with_prefix("logs/")
        .iter()
        .filter_map(|k| store.body(k))
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .collect()
}

#[test]
fn test_regular_activity_is_logged() {
    let h = harness(
        ScriptedInput::new(&[(0.0, 0.0), (3.0, 1.0), (5.0, 9.0)], 2),
        false,
    );
    assert!(h.agent.start());

    assert!(wait_until(PATIENCE, || {
        log_bodies(&h.store)
            .iter()
            .any(|b| b.starts_with("Mouse movements: [(0, 0), (3, 1), (5, 9)]"))
    }));

    h.agent.shutdown();
    assert_eq!(h.starts.load(Ordering::SeqCst), 1);
    assert_eq!(h.stops.load(Ordering::SeqCst), 1);
    assert!(h.agent.stats().snapshot().windows_logged >= 1);
    assert!(h.store.keys_with_prefix("screenshots/").is_empty());
}

#[test]
fn test_scripted_activity_is_suppressed() {
    let h = harness(
        ScriptedInput::new(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)], 0),
        false,
    );
    h.agent.start();

    assert!(wait_until(PATIENCE, || {
        h.agent.stats().snapshot().windows_suppressed >= 1
    }));
    h.agent.shutdown();

    assert!(log_bodies(&h.store).iter().all(|b| !b.contains("(2, 2)")));
}

#[test]
fn test_screenshot_taken_on_start() {
    let h = harness(ScriptedInput::new(&[], 0), true);
    h.agent.toggle_blur();
    h.agent.start();

    assert!(wait_until(PATIENCE, || {
        !h.store.keys_with_prefix("screenshots/").is_empty()
    }));
    h.agent.shutdown();

    let key = &h.store.keys_with_prefix("screenshots/")[0];
    assert!(key.ends_with(".png"));
    let body = h.store.body(key).unwrap();
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(h.agent.stats().snapshot().screenshots_captured, 1);
}

#[test]
fn test_screenshot_toggle_applies_on_next_run() {
    let h = harness(ScriptedInput::new(&[], 0), false);
    h.agent.start();
    std::thread::sleep(Duration::from_millis(200));
    h.agent.shutdown();
    assert!(h.store.keys_with_prefix("screenshots/").is_empty());

    assert!(h.agent.toggle_screenshot_capture());
    h.agent.start();
    assert!(wait_until(PATIENCE, || {
        !h.store.keys_with_prefix("screenshots/").is_empty()
    }));
    h.agent.shutdown();
    assert_eq!(h.starts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_offline_artifacts_are_delivered_after_recovery() {
    let h = harness(ScriptedInput::new(&[], 0), true);
    h.online.store(false, Ordering::SeqCst);
    h.store.set_failing(true);
    h.agent.start();

    assert!(wait_until(PATIENCE, || !h.agent.queue().is_empty()));
    assert!(h.store.keys().is_empty());

    h.store.set_failing(false);
    h.online.store(true, Ordering::SeqCst);
    assert!(wait_until(PATIENCE, || {
        h.agent.queue().is_empty() && !h.store.keys_with_prefix("screenshots/").is_empty()
    }));
    h.agent.shutdown();

    let stats = h.agent.stats().snapshot();
    assert!(stats.artifacts_queued >= 1);
    assert!(stats.delivery_failures >= 1);
}

#[test]
fn test_stop_returns_immediately_and_restart_works() {
    let h = harness(ScriptedInput::new(&[], 0), false);
    h.agent.start();
    std::thread::sleep(Duration::from_millis(100));

    let began = Instant::now();
    assert!(h.agent.stop());
    assert!(began.elapsed() < Duration::from_millis(500));
    assert!(!h.agent.is_capturing());

    assert!(h.agent.start());
    assert!(wait_until(PATIENCE, || h.starts.load(Ordering::SeqCst) == 2));
    h.agent.shutdown();
    assert_eq!(h.stops.load(Ordering::SeqCst), 2);
}

#[test]
fn test_restart_does_not_wait_for_inflight_upload() {
    let h = harness(ScriptedInput::new(&[], 0), true);
    h.store.set_delay(Duration::from_secs(1));
    h.agent.start();
    // The first screenshot is now stuck in a slow put
    assert!(wait_until(PATIENCE, || h.store.attempts.load(Ordering::SeqCst) >= 1));

    assert!(h.agent.stop());
    let began = Instant::now();
    assert!(h.agent.start());
    assert!(began.elapsed() < Duration::from_millis(500));
    assert!(h.agent.is_capturing());

    // The new run picks up only once the old one has released the input
    assert!(wait_until(PATIENCE, || h.starts.load(Ordering::SeqCst) == 2));
    assert_eq!(h.stops.load(Ordering::SeqCst), 1);

    // One screenshot from each run, neither lost
    assert!(wait_until(PATIENCE, || {
        h.store.keys_with_prefix("screenshots/").len() == 2
    }));

    h.store.set_delay(Duration::ZERO);
    h.agent.shutdown();
    assert_eq!(h.stops.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_intervals_are_rejected_while_running() {
    let h = harness(ScriptedInput::new(&[], 0), false);
    h.agent.start();

    assert!(h.agent.set_activity_interval(0).is_err());
    assert!(h.agent.set_activity_interval(-5).is_err());
    assert_eq!(h.agent.settings().snapshot().activity_interval_secs, 1);
    assert!(h.agent.set_screenshot_interval(0).is_err());
    assert_eq!(h.agent.settings().snapshot().screenshot_interval_mins, 1);

    assert_eq!(h.agent.set_activity_interval(2).unwrap(), 2);
    h.agent.shutdown();
}
