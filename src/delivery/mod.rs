//! Getting artifacts to the object store.
//!
//! [`Dispatcher`] bundles the probe, uploader and retry queue that both
//! capture loops share. Routing tries an immediate upload when the network
//! looks reachable and falls back to the queue otherwise.

pub mod probe;
pub mod queue;
pub mod spool;
pub mod store;
pub mod uploader;

pub use probe::{ConnectivityProbe, ProbeConfig, TcpProbe};
pub use queue::{DeliveryQueue, DrainReport};
pub use spool::Spool;
pub use store::{DirectoryStore, HttpObjectStore, ObjectStore, StoreConfig, StoreError};
pub use uploader::Uploader;

use crate::core::Artifact;
use crate::stats::SharedStats;
use std::sync::Arc;
use tracing::info;

/// Where a routed artifact ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Delivered,
    Queued,
}

#[derive(Clone)]
pub struct Dispatcher {
    probe: Arc<dyn ConnectivityProbe>,
    uploader: Uploader,
    queue: DeliveryQueue,
    stats: SharedStats,
}

impl Dispatcher {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        store: Arc<dyn ObjectStore>,
        queue: DeliveryQueue,
        stats: SharedStats,
    ) -> Self {
        Self {
            probe,
            uploader: Uploader::new(store, stats.clone()),
            queue,
            stats,
        }
    }

    /// Upload now if reachable, otherwise queue. A failed upload is queued too.
    pub fn route(&self, artifact: Artifact) -> Routed {
        if !self.probe.is_connected() {
            info!("No internet connection. {} added to the queue.", artifact.kind());
            self.enqueue(artifact);
            return Routed::Queued;
        }

        if self.uploader.deliver(&artifact) {
            Routed::Delivered
        } else {
            self.enqueue(artifact);
            Routed::Queued
        }
    }

    /// One drain attempt over the backlog.
    pub fn flush(&self) -> DrainReport {
        self.queue.drain_attempt(&self.uploader)
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    fn enqueue(&self, artifact: Artifact) {
        self.stats.record_queued();
        self.queue.enqueue(artifact);
    }
}
