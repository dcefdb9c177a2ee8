//! Single delivery attempts against the object store.

use crate::core::Artifact;
use crate::delivery::store::ObjectStore;
use crate::stats::SharedStats;
use std::sync::Arc;
use tracing::{info, warn};

/// Wraps an [`ObjectStore`] so a failed put is a value, not an error.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    stats: SharedStats,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, stats: SharedStats) -> Self {
        Self { store, stats }
    }

    /// Try to put the artifact once. Returns true on success.
    ///
    /// Store errors are logged and swallowed; requeueing is the caller's job.
    pub fn deliver(&self, artifact: &Artifact) -> bool {
        match self.store.put(
            artifact.key(),
            artifact.payload(),
            artifact.kind().content_type(),
        ) {
            Ok(()) => {
                info!("Uploaded {} successfully", artifact.key());
                self.stats.record_delivered();
                true
            }
            Err(e) => {
                warn!("Error uploading {}: {e}", artifact.key());
                self.stats.record_delivery_failure();
                false
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}
