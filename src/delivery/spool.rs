//! On-disk spool so queued artifacts survive a restart.
//!
//! Layout: `manifest.json` plus one payload file per artifact, numbered in
//! queue order.

use crate::core::{Artifact, ArtifactKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct SpoolEntry {
    kind: ArtifactKind,
    name: String,
    created_at: DateTime<Utc>,
    file: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: Vec<SpoolEntry>,
}

/// Directory holding spooled artifacts.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the spool contents with `artifacts`, in order.
    pub fn save(&self, artifacts: &[Artifact]) -> Result<(), std::io::Error> {
        self.clear()?;
        if artifacts.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut manifest = Manifest::default();
        for (i, artifact) in artifacts.iter().enumerate() {
            let file = format!("{i:06}.bin");
            std::fs::write(self.dir.join(&file), artifact.payload())?;
            manifest.entries.push(SpoolEntry {
                kind: artifact.kind(),
                name: artifact.name().to_string(),
                created_at: artifact.created_at(),
                file,
            });
        }

        let json = serde_json::to_string_pretty(&manifest).map_err(std::io::Error::other)?;
        std::fs::write(self.dir.join(MANIFEST), json)
    }

    /// Number of artifacts recorded in the manifest, without reading payloads.
    pub fn pending(&self) -> usize {
        self.read_manifest()
            .map(|m| m.entries.len())
            .unwrap_or(0)
    }

    /// Read every spooled artifact, leaving the spool in place.
    ///
    /// Entries whose payload file is missing are skipped with a warning.
    pub fn load(&self) -> Result<Vec<Artifact>, std::io::Error> {
        let manifest = match self.read_manifest() {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut artifacts = Vec::with_capacity(manifest.entries.len());
        for entry in manifest.entries {
            match std::fs::read(self.dir.join(&entry.file)) {
                Ok(payload) => artifacts.push(Artifact::from_parts(
                    entry.kind,
                    entry.name,
                    entry.created_at,
                    payload,
                )),
                Err(e) => warn!("Dropping spooled {} ({}): {e}", entry.name, entry.file),
            }
        }
        Ok(artifacts)
    }

    fn read_manifest(&self) -> Result<Manifest, std::io::Error> {
        let content = std::fs::read_to_string(self.dir.join(MANIFEST))?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn clear(&self) -> Result<(), std::io::Error> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
