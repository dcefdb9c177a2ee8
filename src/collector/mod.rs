//! Input event collection.
//!
//! Platform collectors install system hooks and publish [`InputEvent`]s on a
//! bounded channel. [`InputListener`] pumps those events into an
//! [`ActivityRecorder`](crate::core::ActivityRecorder).

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

pub use types::{InputEvent, KeyPressEvent, PointerMoveEvent, PointerPosition};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(target_os = "windows")]
pub use windows::{check_permission, WindowsCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "windows")]
pub type Collector = WindowsCollector;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, NoopCollector};

/// Platform-agnostic collector type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type Collector = NoopCollector;

use crate::core::ActivityRecorder;
use crossbeam_channel::{bounded, select, Sender};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Capacity of the hook → pump channel. Events beyond this are dropped
/// by the hook rather than blocking the OS callback.
pub const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Configuration for which event sources to capture.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub capture_keyboard: bool,
    pub capture_mouse: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            capture_keyboard: true,
            capture_mouse: true,
        }
    }
}

/// Errors that can occur during event collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Input Monitoring permission not granted")]
    PermissionDenied,
    #[error("Failed to create CGEvent tap")]
    TapCreationFailed,
    #[error("Failed to create run loop source")]
    RunLoopSourceFailed,
    #[error("Failed to install Windows hook")]
    HookInstallationFailed,
}

/// Something that feeds pointer and keyboard activity into a recorder
/// between `start` and `stop`.
pub trait InputSource: Send {
    fn start(&mut self, recorder: ActivityRecorder) -> Result<(), CollectorError>;
    fn stop(&mut self);
}

/// Platform collector plus a pump thread forwarding its events into a recorder.
pub struct InputListener {
    collector: Collector,
    pump: Option<(Sender<()>, JoinHandle<()>)>,
}

impl InputListener {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            collector: Collector::new(config),
            pump: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.collector.is_running()
    }
}

impl InputSource for InputListener {
    fn start(&mut self, recorder: ActivityRecorder) -> Result<(), CollectorError> {
        if self.pump.is_some() {
            return Err(CollectorError::AlreadyRunning);
        }
        self.collector.start()?;

        let events = self.collector.receiver().clone();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::spawn(move || loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(events) -> msg => match msg {
                    Ok(event) => recorder.record(event),
                    Err(_) => break,
                },
            }
        });

        self.pump = Some((stop_tx, handle));
        debug!("Input listener started");
        Ok(())
    }

    fn stop(&mut self) {
        self.collector.stop();
        if let Some((stop_tx, handle)) = self.pump.take() {
            drop(stop_tx);
            let _ = handle.join();
        }
        // Anything the hook queued after the pump exited belongs to no window.
        while self.collector.try_recv().is_some() {}
        debug!("Input listener stopped");
    }
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.stop();
    }
}
