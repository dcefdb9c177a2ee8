//! Configuration for the activity capture agent.
//!
//! [`Config`] is the persisted file the CLI edits. [`SharedSettings`] is the
//! live, thread-safe subset the capture loops read once per cycle.

use crate::core::AnomalyThresholds;
use crate::delivery::{ProbeConfig, StoreConfig};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between activity log windows
    pub activity_interval_secs: u64,

    /// Minutes between screenshots
    pub screenshot_interval_mins: u64,

    /// Whether screenshots are taken at all
    pub capture_screenshots: bool,

    /// Whether screenshots are blurred before upload
    pub capture_blurred: bool,

    /// Gaussian sigma used when blurring
    pub blur_sigma: f32,

    /// Whether a running agent should be capturing
    pub capturing: bool,

    /// Which input sources to capture
    pub sources: SourceConfig,

    /// Object store destination
    pub store: StoreConfig,

    /// Connectivity probe target
    pub probe: ProbeConfig,

    /// Anomaly filter tuning
    pub anomaly: AnomalyThresholds,

    /// IANA timezone used in artifact names
    pub naming_timezone: String,

    /// Path for the lock file, spool and stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-capture-agent");

        let settings = TrackerSettings::default();
        Self {
            activity_interval_secs: settings.activity_interval_secs,
            screenshot_interval_mins: settings.screenshot_interval_mins,
            capture_screenshots: settings.capture_screenshots,
            capture_blurred: settings.capture_blurred,
            blur_sigma: 10.0,
            capturing: false,
            sources: SourceConfig::default(),
            store: StoreConfig::default(),
            probe: ProbeConfig::default(),
            anomaly: AnomalyThresholds::default(),
            naming_timezone: "UTC".to_string(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-capture-agent")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_path.join("agent.lock")
    }

    pub fn spool_path(&self) -> PathBuf {
        self.data_path.join("spool")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Validated runtime settings from this file.
    ///
    /// Intervals go through the same checks as the live setters.
    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        Ok(TrackerSettings {
            activity_interval_secs: validate_interval(
                "activity interval",
                self.activity_interval_secs as i64,
            )?,
            screenshot_interval_mins: validate_interval(
                "screenshot interval",
                self.screenshot_interval_mins as i64,
            )?,
            capture_screenshots: self.capture_screenshots,
            capture_blurred: self.capture_blurred,
        })
    }
}

/// Configuration for which input sources to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub keyboard: bool,
    pub mouse: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            keyboard: sources.iter().any(|s| s == "keyboard" || s == "all"),
            mouse: sources.iter().any(|s| s == "mouse" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.keyboard || self.mouse
    }
}

/// Settings the capture loops re-read at the start of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub activity_interval_secs: u64,
    pub screenshot_interval_mins: u64,
    pub capture_screenshots: bool,
    pub capture_blurred: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            activity_interval_secs: 5,
            screenshot_interval_mins: 5,
            capture_screenshots: true,
            capture_blurred: false,
        }
    }
}

impl TrackerSettings {
    pub fn activity_interval(&self) -> Duration {
        Duration::from_secs(self.activity_interval_secs)
    }

    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_secs(self.screenshot_interval_mins.saturating_mul(60))
    }
}

/// Shared handle to the live [`TrackerSettings`].
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<TrackerSettings>>,
}

impl SharedSettings {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> TrackerSettings {
        *self.inner.read()
    }

    /// Set the activity interval. Values below one second are rejected and
    /// the previous value is kept.
    pub fn set_activity_interval(&self, secs: i64) -> Result<u64, ConfigError> {
        let secs = validate_interval("activity interval", secs)?;
        self.inner.write().activity_interval_secs = secs;
        Ok(secs)
    }

    /// Set the screenshot interval. Values below one minute are rejected and
    /// the previous value is kept.
    pub fn set_screenshot_interval(&self, mins: i64) -> Result<u64, ConfigError> {
        let mins = validate_interval("screenshot interval", mins)?;
        self.inner.write().screenshot_interval_mins = mins;
        Ok(mins)
    }

    /// Flip screenshot capture, returning the new state.
    pub fn toggle_screenshot_capture(&self) -> bool {
        let mut settings = self.inner.write();
        settings.capture_screenshots = !settings.capture_screenshots;
        settings.capture_screenshots
    }

    /// Flip screenshot blurring, returning the new state.
    pub fn toggle_blur(&self) -> bool {
        let mut settings = self.inner.write();
        settings.capture_blurred = !settings.capture_blurred;
        settings.capture_blurred
    }
}

/// Reject intervals below 1.
pub fn validate_interval(what: &'static str, value: i64) -> Result<u64, ConfigError> {
    if value < 1 {
        return Err(ConfigError::InvalidInterval { what, value });
    }
    Ok(value as u64)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid {what}: {value} (must be at least 1)")]
    InvalidInterval { what: &'static str, value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("keyboard,mouse");
        assert!(config.keyboard);
        assert!(config.mouse);

        let config = SourceConfig::from_csv("keyboard");
        assert!(config.keyboard);
        assert!(!config.mouse);

        let config = SourceConfig::from_csv("all");
        assert!(config.keyboard);
        assert!(config.mouse);

        assert!(!SourceConfig::from_csv("trackpad").any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.activity_interval_secs, 5);
        assert_eq!(config.screenshot_interval_mins, 5);
        assert!(config.capture_screenshots);
        assert!(!config.capture_blurred);
        assert!(!config.capturing);
        assert_eq!(config.naming_timezone, "UTC");
        assert_eq!(config.tracker_settings().unwrap(), TrackerSettings::default());
    }

    #[test]
    fn test_invalid_interval_rejected_and_prior_value_kept() {
        let settings = SharedSettings::default();
        assert!(matches!(
            settings.set_activity_interval(0),
            Err(ConfigError::InvalidInterval { value: 0, .. })
        ));
        assert!(settings.set_activity_interval(-3).is_err());
        assert_eq!(settings.snapshot().activity_interval_secs, 5);

        assert_eq!(settings.set_activity_interval(12).unwrap(), 12);
        assert_eq!(settings.snapshot().activity_interval(), Duration::from_secs(12));

        assert!(settings.set_screenshot_interval(0).is_err());
        assert_eq!(settings.snapshot().screenshot_interval_mins, 5);
        settings.set_screenshot_interval(2).unwrap();
        assert_eq!(settings.snapshot().screenshot_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_toggles() {
        let settings = SharedSettings::default();
        assert!(!settings.toggle_screenshot_capture());
        assert!(settings.toggle_screenshot_capture());
        assert!(settings.toggle_blur());
        assert!(settings.snapshot().capture_blurred);
    }

    #[test]
    fn test_huge_screenshot_interval_saturates() {
        let settings = SharedSettings::default();
        assert_eq!(settings.set_screenshot_interval(i64::MAX).unwrap(), i64::MAX as u64);
        assert_eq!(
            settings.snapshot().screenshot_interval(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_file_round_trip_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.activity_interval_secs = 30;
        config.store.bucket = "captures".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.activity_interval_secs, 30);
        assert_eq!(loaded.store.bucket, "captures");

        // Missing fields fall back to defaults
        std::fs::write(&path, r#"{"capture_blurred": true}"#).unwrap();
        let partial = Config::load_from(&path).unwrap();
        assert!(partial.capture_blurred);
        assert_eq!(partial.screenshot_interval_mins, 5);
    }

    #[test]
    fn test_zero_interval_in_file_is_rejected() {
        let config = Config {
            screenshot_interval_mins: 0,
            ..Config::default()
        };
        assert!(config.tracker_settings().is_err());
    }
}
