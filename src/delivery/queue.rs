//! In-memory retry queue for artifacts awaiting upload.

use crate::core::Artifact;
use crate::delivery::uploader::Uploader;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Outcome of one [`DeliveryQueue::drain_attempt`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Artifacts uploaded during this drain
    pub delivered: usize,
    /// Whether an attempt failed and its artifact went back to the tail
    pub requeued: bool,
}

/// FIFO queue of artifacts not yet uploaded, shared by both loops.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct DeliveryQueue {
    items: Arc<Mutex<VecDeque<Artifact>>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Never blocks beyond the lock; unbounded.
    pub fn enqueue(&self, artifact: Artifact) {
        self.items.lock().push_back(artifact);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Keys currently queued, head first.
    pub fn keys(&self) -> Vec<String> {
        self.items
            .lock()
            .iter()
            .map(|a| a.key().to_string())
            .collect()
    }

    /// Copy of everything queued, head first. The queue is left untouched.
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.items.lock().iter().cloned().collect()
    }

    /// Remove and return everything, head first.
    pub fn take_all(&self) -> Vec<Artifact> {
        self.items.lock().drain(..).collect()
    }

    /// Append artifacts in order.
    pub fn extend(&self, artifacts: impl IntoIterator<Item = Artifact>) {
        self.items.lock().extend(artifacts);
    }

    /// Deliver from the head until the queue is empty or one attempt fails.
    ///
    /// A failed artifact goes back to the tail and draining stops for this
    /// call, so a dead store costs at most one failed attempt per cycle.
    /// The lock is not held during uploads.
    pub fn drain_attempt(&self, uploader: &Uploader) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let Some(artifact) = self.items.lock().pop_front() else {
                break;
            };

            if uploader.deliver(&artifact) {
                report.delivered += 1;
            } else {
                debug!("Retry failed for {}; requeued", artifact.key());
                self.items.lock().push_back(artifact);
                report.requeued = true;
                break;
            }
        }

        report
    }
}
