//! Deliverable units: activity logs and screenshots.

use crate::core::recorder::ActivityWindow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// What an artifact contains, which decides its key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    ActivityLog,
}

impl ArtifactKind {
    /// Key prefix in the object store.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshots",
            ArtifactKind::ActivityLog => "logs",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshot",
            ArtifactKind::ActivityLog => "activity_log",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::ActivityLog => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "image/png",
            ArtifactKind::ActivityLog => "text/plain; charset=utf-8",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Screenshot => write!(f, "screenshot"),
            ArtifactKind::ActivityLog => write!(f, "activity log"),
        }
    }
}

/// An immutable payload on its way to the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    kind: ArtifactKind,
    name: String,
    key: String,
    created_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Artifact {
    /// Assemble an artifact from stored parts (used when restoring a spool).
    pub fn from_parts(
        kind: ArtifactKind,
        name: String,
        created_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        let key = format!("{}/{}", kind.key_prefix(), name);
        Self {
            kind,
            name,
            key,
            created_at,
            payload,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination key, `logs/<name>` or `screenshots/<name>`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Produces timestamped, collision-free artifact names.
///
/// Names look like `activity_log_20240131-235959_1a2b3c4d.txt`. The hex
/// suffix keeps same-second artifacts of one kind from sharing a key.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    timezone: Tz,
}

impl ArtifactNamer {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Parse an IANA timezone name, e.g. `Europe/Berlin`.
    pub fn from_timezone_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn name_for(&self, kind: ArtifactKind, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.timezone);
        let discriminator = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}.{}",
            kind.file_stem(),
            local.format("%Y%m%d-%H%M%S"),
            &discriminator[..8],
            kind.extension()
        )
    }

    /// Activity-log artifact carrying the window's text summary.
    pub fn activity_log(&self, window: &ActivityWindow) -> Artifact {
        let now = Utc::now();
        Artifact::from_parts(
            ArtifactKind::ActivityLog,
            self.name_for(ArtifactKind::ActivityLog, now),
            now,
            window.summary().into_bytes(),
        )
    }

    /// Screenshot artifact from encoded PNG bytes.
    pub fn screenshot(&self, png: Vec<u8>) -> Artifact {
        let now = Utc::now();
        Artifact::from_parts(
            ArtifactKind::Screenshot,
            self.name_for(ArtifactKind::Screenshot, now),
            now,
            png,
        )
    }
}

impl Default for ArtifactNamer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}
