//! Core capture logic.
//!
//! This module contains:
//! - The activity recorder that buffers input between drains
//! - The anomaly filter that gates which windows get logged
//! - Artifact types and naming

pub mod anomaly;
pub mod artifact;
pub mod recorder;

// Re-export commonly used types
pub use anomaly::{AnomalyFilter, AnomalyThresholds, Irregularity};
pub use artifact::{Artifact, ArtifactKind, ArtifactNamer};
pub use recorder::{ActivityRecorder, ActivityWindow};
