//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use activity_capture_agent::capture::CaptureError;
use activity_capture_agent::{ActivityRecorder, CollectorError, InputSource, ObjectStore, ScreenSource, StoreError};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory store that can be switched between accepting and failing puts.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
    pub attempts: AtomicUsize,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    delay_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every put take at least `delay`, like a slow uplink.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail the next `n` puts, then go back to normal.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, b)| b.clone())
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, body: &[u8], _content_type: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Network("store offline".to_string()));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(StoreError::Server {
                status: 503,
                message: "try again".to_string(),
            });
        }
        self.objects.lock().push((key.to_string(), body.to_vec()));
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Probe whose answer the test controls.
pub fn switch_probe(online: bool) -> (Arc<AtomicBool>, Arc<dyn activity_capture_agent::ConnectivityProbe>) {
    let flag = Arc::new(AtomicBool::new(online));
    let probe_flag = flag.clone();
    (flag, Arc::new(move || probe_flag.load(Ordering::SeqCst)))
}

/// Solid 16x16 frame.
pub struct FakeScreen;

impl ScreenSource for FakeScreen {
    fn capture(&self) -> Result<RgbaImage, CaptureError> {
        Ok(RgbaImage::from_pixel(16, 16, Rgba([40, 80, 120, 255])))
    }
}

/// Input source that replays a fixed set of pointer positions and key
/// presses on every start.
pub struct ScriptedInput {
    pub positions: Vec<(f64, f64)>,
    pub key_presses: usize,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new(positions: &[(f64, f64)], key_presses: usize) -> Self {
        Self {
            positions: positions.to_vec(),
            key_presses,
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InputSource for ScriptedInput {
    fn start(&mut self, recorder: ActivityRecorder) -> Result<(), CollectorError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        for &(x, y) in &self.positions {
            recorder.on_pointer_move(x, y);
        }
        for _ in 0..self.key_presses {
            recorder.on_key_press();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
