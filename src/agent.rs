//! The capture agent: monitoring loop, screenshot loop and the control
//! surface that starts, stops and reconfigures them.
//!
//! Both loops run on their own threads and share only the [`Dispatcher`]
//! (and through it the delivery queue), the recorder, the live settings and
//! the stats. Cancellation is a crossbeam channel whose sender is dropped by
//! [`Agent::stop`]; loops wake from their interval wait immediately and exit
//! at the cycle boundary.

use crate::capture::{capture_screenshot, default_screen_source, CaptureOptions, ScreenSource};
use crate::collector::{CollectorConfig, InputListener, InputSource};
use crate::config::{Config, ConfigError, SharedSettings};
use crate::core::{ActivityRecorder, ActivityWindow, AnomalyFilter, ArtifactNamer};
use crate::delivery::{
    ConnectivityProbe, DeliveryQueue, Dispatcher, ObjectStore, StoreError, TcpProbe,
};
use crate::stats::SharedStats;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Errors assembling an agent from configuration.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unknown timezone '{0}'")]
    Timezone(String),
}

/// Everything the loops need, supplied by the caller.
pub struct AgentComponents {
    pub settings: SharedSettings,
    pub dispatcher: Dispatcher,
    pub recorder: ActivityRecorder,
    pub input: Box<dyn InputSource>,
    pub screen: Arc<dyn ScreenSource>,
    pub filter: AnomalyFilter,
    pub namer: ArtifactNamer,
    pub capture_options: CaptureOptions,
    pub stats: SharedStats,
}

impl AgentComponents {
    /// Wire up the platform listener, screen source, probe and store that
    /// `config` describes.
    pub fn from_config(config: &Config, stats: SharedStats) -> Result<Self, AgentError> {
        let settings = SharedSettings::new(config.tracker_settings()?);
        let namer = ArtifactNamer::from_timezone_name(&config.naming_timezone)
            .ok_or_else(|| AgentError::Timezone(config.naming_timezone.clone()))?;

        let store: Arc<dyn ObjectStore> = Arc::from(config.store.build()?);
        let probe: Arc<dyn ConnectivityProbe> = Arc::new(TcpProbe::from_config(&config.probe));
        let dispatcher = Dispatcher::new(probe, store, DeliveryQueue::new(), stats.clone());

        let input = InputListener::new(CollectorConfig {
            capture_keyboard: config.sources.keyboard,
            capture_mouse: config.sources.mouse,
        });

        Ok(Self {
            settings,
            dispatcher,
            recorder: ActivityRecorder::new(),
            input: Box::new(input),
            screen: Arc::from(default_screen_source()),
            filter: AnomalyFilter::new(config.anomaly),
            namer,
            capture_options: CaptureOptions {
                blur_sigma: config.blur_sigma,
            },
            stats,
        })
    }
}

/// State shared by both loop threads.
#[derive(Clone)]
struct LoopContext {
    settings: SharedSettings,
    dispatcher: Dispatcher,
    recorder: ActivityRecorder,
    input: Arc<Mutex<Box<dyn InputSource>>>,
    screen: Arc<dyn ScreenSource>,
    filter: AnomalyFilter,
    namer: ArtifactNamer,
    capture_options: CaptureOptions,
    stats: SharedStats,
}

/// Join handles for one run's loop threads.
#[derive(Default)]
struct LoopHandles {
    monitor: Option<JoinHandle<()>>,
    screenshot: Option<JoinHandle<()>>,
}

impl LoopHandles {
    fn join(self) {
        join_all(self.monitor.into_iter().chain(self.screenshot));
    }
}

struct RunningLoops {
    stop_tx: Sender<()>,
    handles: LoopHandles,
}

/// Background capture agent.
pub struct Agent {
    ctx: LoopContext,
    capturing: Arc<AtomicBool>,
    running: Mutex<Option<RunningLoops>>,
    /// Runs signalled to stop but not yet joined
    retired: Mutex<Vec<LoopHandles>>,
}

impl Agent {
    pub fn new(components: AgentComponents) -> Self {
        Self {
            ctx: LoopContext {
                settings: components.settings,
                dispatcher: components.dispatcher,
                recorder: components.recorder,
                input: Arc::new(Mutex::new(components.input)),
                screen: components.screen,
                filter: components.filter,
                namer: components.namer,
                capture_options: components.capture_options,
                stats: components.stats,
            },
            capturing: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Begin capturing. Returns false if already capturing.
    ///
    /// Never waits on a previous run. Each new loop thread first joins its
    /// predecessor, so a stopped run can finish an upload while the control
    /// surface stays responsive and two loops of one kind never overlap.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if self.capturing.swap(true, Ordering::SeqCst) {
            return false;
        }

        let (prev_monitors, prev_screenshots): (Vec<_>, Vec<_>) = self
            .retired
            .lock()
            .drain(..)
            .map(|h| (h.monitor, h.screenshot))
            .unzip();

        let (stop_tx, stop_rx) = bounded::<()>(0);

        let ctx = self.ctx.clone();
        let rx = stop_rx.clone();
        let monitor = spawn_loop("activity-monitor", move || {
            join_all(prev_monitors.into_iter().flatten());
            ctx.monitor_loop(rx)
        });

        let ctx = self.ctx.clone();
        let screenshot = spawn_loop("screenshot", move || {
            join_all(prev_screenshots.into_iter().flatten());
            ctx.screenshot_loop(stop_rx)
        });

        *running = Some(RunningLoops {
            stop_tx,
            handles: LoopHandles {
                monitor,
                screenshot,
            },
        });
        info!("Capture started");
        true
    }

    /// Signal both loops to stop. Does not wait for them; returns false if
    /// the agent was not capturing.
    pub fn stop(&self) -> bool {
        let mut running = self.running.lock();
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return false;
        }

        if let Some(loops) = running.take() {
            drop(loops.stop_tx);
            self.retired.lock().push(loops.handles);
        }
        info!("Capture stopped");
        true
    }

    /// Stop and wait for the loop threads to exit.
    pub fn shutdown(&self) {
        self.stop();
        let retired: Vec<_> = self.retired.lock().drain(..).collect();
        for handles in retired {
            handles.join();
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Set the activity interval in seconds. Takes effect next cycle.
    pub fn set_activity_interval(&self, secs: i64) -> Result<u64, ConfigError> {
        let secs = self.ctx.settings.set_activity_interval(secs)?;
        info!("Activity interval set to {secs}s");
        Ok(secs)
    }

    /// Set the screenshot interval in minutes. Takes effect next cycle.
    pub fn set_screenshot_interval(&self, mins: i64) -> Result<u64, ConfigError> {
        let mins = self.ctx.settings.set_screenshot_interval(mins)?;
        info!("Screenshot interval set to {mins}m");
        Ok(mins)
    }

    pub fn toggle_screenshot_capture(&self) -> bool {
        let enabled = self.ctx.settings.toggle_screenshot_capture();
        info!("Screenshot capture {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn toggle_blur(&self) -> bool {
        let enabled = self.ctx.settings.toggle_blur();
        info!("Screenshot blur {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.ctx.settings
    }

    pub fn queue(&self) -> &DeliveryQueue {
        self.ctx.dispatcher.queue()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.ctx.dispatcher
    }

    pub fn recorder(&self) -> &ActivityRecorder {
        &self.ctx.recorder
    }

    pub fn stats(&self) -> &SharedStats {
        &self.ctx.stats
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_loop<F>(name: &str, body: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to spawn {name} thread: {e}");
            None
        }
    }
}

fn join_all(handles: impl IntoIterator<Item = JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("A capture loop thread panicked");
        }
    }
}

/// Wait up to `interval` for a stop signal. Returns true when the loop
/// should keep going.
fn wait_for_next_cycle(stop_rx: &Receiver<()>, interval: std::time::Duration) -> bool {
    matches!(stop_rx.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

impl LoopContext {
    fn monitor_loop(&self, stop_rx: Receiver<()>) {
        // Anything left over from before this run belongs to no window.
        self.recorder.drain_window();
        if let Err(e) = self.input.lock().start(self.recorder.clone()) {
            warn!("Input listeners unavailable: {e}");
        }

        let mut last_logged = Instant::now();
        loop {
            let interval = self.settings.snapshot().activity_interval();
            if !wait_for_next_cycle(&stop_rx, interval) {
                break;
            }

            if last_logged.elapsed() >= interval {
                let window = self.recorder.drain_window();
                last_logged = Instant::now();
                self.handle_window(window);
            }

            self.dispatcher.flush();
        }

        self.input.lock().stop();
        debug!("Monitoring loop exited");
    }

    fn handle_window(&self, window: ActivityWindow) {
        if let Some(reason) = self.filter.assess(&window) {
            info!(
                "Irregular activity detected ({reason}); discarding {} samples",
                window.event_count()
            );
            self.stats.record_window_suppressed();
            return;
        }

        let artifact = self.namer.activity_log(&window);
        debug!(
            "Logging activity window {} ({} samples)",
            artifact.name(),
            window.event_count()
        );
        self.stats.record_window_logged();
        self.dispatcher.route(artifact);
    }

    fn screenshot_loop(&self, stop_rx: Receiver<()>) {
        loop {
            if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            let interval = self.screenshot_cycle();
            if !wait_for_next_cycle(&stop_rx, interval) {
                break;
            }
        }
        debug!("Screenshot loop exited");
    }

    /// One screenshot cycle against the settings as they are now. Returns the
    /// wait before the next one.
    fn screenshot_cycle(&self) -> std::time::Duration {
        let settings = self.settings.snapshot();
        if settings.capture_screenshots {
            self.take_screenshot(settings.capture_blurred);
        }
        self.dispatcher.flush();
        settings.screenshot_interval()
    }

    fn take_screenshot(&self, blurred: bool) {
        match capture_screenshot(self.screen.as_ref(), blurred, &self.capture_options) {
            Ok(png) => {
                self.stats.record_screenshot_captured();
                self.dispatcher.route(self.namer.screenshot(png));
            }
            Err(e) => {
                warn!("Screenshot skipped: {e}");
                self.stats.record_capture_failure();
            }
        }
    }
}
