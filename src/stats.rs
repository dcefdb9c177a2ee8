//! Running counters for what the agent captured and shipped.
//!
//! Counters are lock-free so the loops and the uploader can bump them from
//! any thread. They persist across runs in `stats.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current process, seeded from disk when persisted.
#[derive(Debug)]
pub struct AgentStats {
    windows_logged: AtomicU64,
    windows_suppressed: AtomicU64,
    screenshots_captured: AtomicU64,
    capture_failures: AtomicU64,
    artifacts_delivered: AtomicU64,
    delivery_failures: AtomicU64,
    artifacts_queued: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl AgentStats {
    pub fn new() -> Self {
        Self {
            windows_logged: AtomicU64::new(0),
            windows_suppressed: AtomicU64::new(0),
            screenshots_captured: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            artifacts_delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            artifacts_queued: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats backed by a file, loading previous totals if present.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous stats: {e}");
        }

        stats
    }

    pub fn record_window_logged(&self) {
        self.windows_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_suppressed(&self) {
        self.windows_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_screenshot_captured(&self) {
        self.screenshots_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.artifacts_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.artifacts_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            windows_logged: self.windows_logged.load(Ordering::Relaxed),
            windows_suppressed: self.windows_suppressed.load(Ordering::Relaxed),
            screenshots_captured: self.screenshots_captured.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            artifacts_delivered: self.artifacts_delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            artifacts_queued: self.artifacts_queued.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Capture Statistics:\n\
             - Activity windows logged: {}\n\
             - Activity windows suppressed: {}\n\
             - Screenshots captured: {}\n\
             - Capture failures: {}\n\
             - Artifacts delivered: {}\n\
             - Delivery failures: {}\n\
             - Artifacts queued offline: {}\n\
             - Session duration: {} seconds",
            stats.windows_logged,
            stats.windows_suppressed,
            stats.screenshots_captured,
            stats.capture_failures,
            stats.artifacts_delivered,
            stats.delivery_failures,
            stats.artifacts_queued,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                windows_logged: stats.windows_logged,
                windows_suppressed: stats.windows_suppressed,
                screenshots_captured: stats.screenshots_captured,
                capture_failures: stats.capture_failures,
                artifacts_delivered: stats.artifacts_delivered,
                delivery_failures: stats.delivery_failures,
                artifacts_queued: stats.artifacts_queued,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;

                self.windows_logged
                    .store(persisted.windows_logged, Ordering::Relaxed);
                self.windows_suppressed
                    .store(persisted.windows_suppressed, Ordering::Relaxed);
                self.screenshots_captured
                    .store(persisted.screenshots_captured, Ordering::Relaxed);
                self.capture_failures
                    .store(persisted.capture_failures, Ordering::Relaxed);
                self.artifacts_delivered
                    .store(persisted.artifacts_delivered, Ordering::Relaxed);
                self.delivery_failures
                    .store(persisted.delivery_failures, Ordering::Relaxed);
                self.artifacts_queued
                    .store(persisted.artifacts_queued, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for AgentStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub windows_logged: u64,
    pub windows_suppressed: u64,
    pub screenshots_captured: u64,
    pub capture_failures: u64,
    pub artifacts_delivered: u64,
    pub delivery_failures: u64,
    pub artifacts_queued: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub windows_logged: u64,
    pub windows_suppressed: u64,
    pub screenshots_captured: u64,
    pub capture_failures: u64,
    pub artifacts_delivered: u64,
    pub delivery_failures: u64,
    pub artifacts_queued: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read persisted totals without constructing live counters (for `status`).
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared stats handle.
pub type SharedStats = Arc<AgentStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(AgentStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedStats {
    Arc::new(AgentStats::with_persistence(path))
}
