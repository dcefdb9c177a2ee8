//! Heuristic detection of scripted or automated input.
//!
//! A window is irregular when the pointer moves along a perfectly constant
//! vector, or when key presses arrive implausibly fast. Irregular windows
//! are dropped instead of logged.

use crate::core::recorder::ActivityWindow;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Tuning constants for [`AnomalyFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    /// Below this many pointer samples the window is always regular
    pub min_pointer_samples: usize,
    /// The typing rule only applies with strictly more key presses than this
    pub key_press_sample_floor: usize,
    /// Mean gap between key presses (seconds) under which typing is irregular
    pub min_mean_key_gap_secs: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            min_pointer_samples: 2,
            key_press_sample_floor: 20,
            min_mean_key_gap_secs: 0.05,
        }
    }
}

/// Why a window was judged irregular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Irregularity {
    /// Every pointer step had the same (dx, dy)
    LinearPointerMotion,
    /// Key presses averaged less than the configured gap
    RapidUniformTyping { mean_gap_secs: f64 },
}

impl std::fmt::Display for Irregularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Irregularity::LinearPointerMotion => write!(f, "constant-vector pointer motion"),
            Irregularity::RapidUniformTyping { mean_gap_secs } => {
                write!(f, "key presses {mean_gap_secs:.3}s apart on average")
            }
        }
    }
}

/// Pure classifier over drained activity windows.
#[derive(Debug, Clone, Default)]
pub struct AnomalyFilter {
    thresholds: AnomalyThresholds,
}

impl AnomalyFilter {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AnomalyThresholds {
        &self.thresholds
    }

    /// Returns true if the window looks automated.
    pub fn is_irregular(&self, window: &ActivityWindow) -> bool {
        self.assess(window).is_some()
    }

    /// Classify a window, reporting the first rule that fired.
    ///
    /// Rules run in order: too few pointer samples short-circuits to
    /// regular before the typing rule is consulted.
    pub fn assess(&self, window: &ActivityWindow) -> Option<Irregularity> {
        let positions = &window.pointer_positions;
        if positions.len() < self.thresholds.min_pointer_samples.max(2) {
            return None;
        }

        let mut deltas = positions.windows(2).map(|w| w[1].delta_from(&w[0]));
        if let Some(first) = deltas.next() {
            if deltas.all(|d| d == first) {
                return Some(Irregularity::LinearPointerMotion);
            }
        }

        if window.key_presses.len() > self.thresholds.key_press_sample_floor {
            let mean_gap_secs = window.key_press_gaps_secs().mean();
            if mean_gap_secs < self.thresholds.min_mean_key_gap_secs {
                return Some(Irregularity::RapidUniformTyping { mean_gap_secs });
            }
        }

        None
    }
}
