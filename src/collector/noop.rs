//! Noop collector for targets without a supported hook API.
//!
//! This exists so the crate (and binary) can compile everywhere. The agent
//! still runs; activity windows simply stay empty.

use crate::collector::types::InputEvent;
use crate::collector::{CollectorConfig, CollectorError, EVENT_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A noop collector that never emits events.
pub struct NoopCollector {
    _config: CollectorConfig,
    _sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    /// Create a new noop collector.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            _config: config,
            _sender: sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start capturing events.
    ///
    /// This simply marks the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for input events.
    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.receiver.try_recv().ok()
    }
}

/// There is no input permission gate on these targets.
pub fn check_permission() -> bool {
    true
}
