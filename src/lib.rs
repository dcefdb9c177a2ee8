//! Activity Capture Agent - background capture of input activity and
//! screenshots, shipped to an object store.
//!
//! Two independent loops feed a shared delivery queue:
//!
//! - The **monitoring loop** drains the input recorder every activity
//!   interval, drops windows that look automated and uploads the rest as a
//!   plain-text activity log.
//! - The **screenshot loop** captures the primary screen every screenshot
//!   interval, optionally blurred, and uploads it as PNG.
//!
//! Uploads go straight to the store when the network is reachable and into
//! an in-memory queue otherwise. Each loop makes one drain attempt per cycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Activity Capture Agent                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   │
//! │  │ Collector │──▶│ Recorder  │──▶│ Anomaly   │──▶│           │   │
//! │  │  (hooks)  │   │ (window)  │   │  Filter   │   │           │   │
//! │  └───────────┘   └───────────┘   └───────────┘   │ Dispatcher│   │
//! │                                                  │  (probe,  │   │
//! │  ┌───────────┐   ┌───────────┐                   │  upload,  │   │
//! │  │  Screen   │──▶│ Blur/PNG  │──────────────────▶│  queue)   │   │
//! │  └───────────┘   └───────────┘                   └─────┬─────┘   │
//! │                                                        ▼         │
//! │                                                  ┌───────────┐   │
//! │                                                  │  Object   │   │
//! │                                                  │   Store   │   │
//! │                                                  └───────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_capture_agent::{create_shared_stats, Agent, AgentComponents, Config};
//!
//! let config = Config::load().unwrap_or_default();
//! let components = AgentComponents::from_config(&config, create_shared_stats())
//!     .expect("invalid configuration");
//!
//! let agent = Agent::new(components);
//! agent.start();
//! // ...
//! agent.shutdown();
//! ```

pub mod agent;
pub mod capture;
pub mod collector;
pub mod config;
pub mod core;
pub mod delivery;
pub mod instance;
pub mod stats;

// Re-export key types at crate root for convenience
pub use agent::{Agent, AgentComponents, AgentError};
pub use capture::{CaptureError, CaptureOptions, ScreenSource};
pub use collector::{CollectorConfig, CollectorError, InputEvent, InputListener, InputSource};
pub use config::{Config, ConfigError, SharedSettings, SourceConfig, TrackerSettings};
pub use core::{
    ActivityRecorder, ActivityWindow, AnomalyFilter, AnomalyThresholds, Artifact, ArtifactKind,
    ArtifactNamer,
};
pub use delivery::{
    ConnectivityProbe, DeliveryQueue, Dispatcher, ObjectStore, Spool, StoreConfig, StoreError,
    Uploader,
};
pub use instance::{InstanceError, InstanceLock};
pub use stats::{create_shared_stats, create_shared_stats_with_persistence, AgentStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disclosure of what the agent records, shown by the `disclosure` command.
pub const DISCLOSURE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             ACTIVITY CAPTURE AGENT - DATA DISCLOSURE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  While capturing, this agent records:                            ║
║                                                                  ║
║  ✓ WHAT IS CAPTURED:                                             ║
║    • Mouse pointer positions (screen coordinates)                ║
║    • When keys are pressed (timestamps only)                     ║
║    • Screenshots of the primary display, at the configured       ║
║      interval (optionally blurred before upload)                 ║
║                                                                  ║
║  ✗ WHAT IS NEVER CAPTURED:                                       ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • Clipboard contents or window titles                         ║
║                                                                  ║
║  Activity that looks scripted is discarded locally. Everything   ║
║  else is uploaded to the configured object store. Failed uploads ║
║  stay queued in memory and are retried while the agent runs.     ║
║  The queue is also saved to the data directory and restored on   ║
║  the next start.                                                 ║
║                                                                  ║
║  Capture can be paused anytime with:                             ║
║    activity-agent stop                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
