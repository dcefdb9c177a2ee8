//! Accumulation of input activity between drains.
//!
//! Producers (the input listeners) append concurrently; the monitoring loop
//! periodically takes everything accumulated so far as one [`ActivityWindow`].

use crate::collector::types::{InputEvent, PointerPosition};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Activity accumulated since the previous drain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityWindow {
    /// When accumulation into this window began
    pub started_at: DateTime<Utc>,
    /// When the window was drained (equals `started_at` while still open)
    pub ended_at: DateTime<Utc>,
    /// Pointer positions in arrival order
    pub pointer_positions: Vec<PointerPosition>,
    /// Key-press timestamps in arrival order
    pub key_presses: Vec<DateTime<Utc>>,
}

impl ActivityWindow {
    /// Create a new empty window starting at the given time.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: started_at,
            pointer_positions: Vec::new(),
            key_presses: Vec::new(),
        }
    }

    /// Build a closed window from already-collected samples.
    pub fn from_parts(
        pointer_positions: Vec<PointerPosition>,
        key_presses: Vec<DateTime<Utc>>,
    ) -> Self {
        let started_at = key_presses.first().copied().unwrap_or_else(Utc::now);
        let ended_at = key_presses.last().copied().unwrap_or(started_at);
        Self {
            started_at,
            ended_at,
            pointer_positions,
            key_presses,
        }
    }

    /// Check if the window has any samples.
    pub fn is_empty(&self) -> bool {
        self.pointer_positions.is_empty() && self.key_presses.is_empty()
    }

    /// Total number of samples in this window.
    pub fn event_count(&self) -> usize {
        self.pointer_positions.len() + self.key_presses.len()
    }

    /// Gaps between consecutive key presses, in seconds.
    pub fn key_press_gaps_secs(&self) -> Vec<f64> {
        self.key_presses
            .windows(2)
            .map(|pair| {
                let gap = pair[1] - pair[0];
                gap.num_microseconds()
                    .map(|us| us as f64 / 1_000_000.0)
                    .unwrap_or_else(|| gap.num_milliseconds() as f64 / 1000.0)
            })
            .collect()
    }

    /// Plain-text body uploaded as the activity log.
    pub fn summary(&self) -> String {
        let mut out = String::from("Mouse movements: [");
        for (i, p) in self.pointer_positions.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "({}, {})", p.x, p.y);
        }
        out.push_str("]\nKey presses: [");
        for (i, t) in self.key_presses.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{:.3}", t.timestamp_millis() as f64 / 1000.0);
        }
        out.push_str("]\n");
        out
    }
}

/// Thread-safe accumulator shared by the input listeners and the monitoring loop.
///
/// Cloning yields another handle to the same buffers.
#[derive(Debug, Clone)]
pub struct ActivityRecorder {
    window: Arc<Mutex<ActivityWindow>>,
}

impl ActivityRecorder {
    pub fn new() -> Self {
        Self {
            window: Arc::new(Mutex::new(ActivityWindow::new(Utc::now()))),
        }
    }

    /// Append a pointer position.
    pub fn on_pointer_move(&self, x: f64, y: f64) {
        self.window
            .lock()
            .pointer_positions
            .push(PointerPosition::new(x, y));
    }

    /// Append the current time as a key press.
    pub fn on_key_press(&self) {
        let now = Utc::now();
        self.window.lock().key_presses.push(now);
    }

    /// Append a collected event, keeping the timestamp it was captured with.
    pub fn record(&self, event: InputEvent) {
        let mut window = self.window.lock();
        match event {
            InputEvent::PointerMove(e) => window.pointer_positions.push(e.position),
            InputEvent::KeyPress(e) => window.key_presses.push(e.timestamp),
        }
    }

    /// Take everything accumulated so far and start a fresh window.
    ///
    /// The swap happens under the lock, so every appended sample lands in
    /// exactly one drained window.
    pub fn drain_window(&self) -> ActivityWindow {
        let now = Utc::now();
        let mut guard = self.window.lock();
        let mut drained = std::mem::replace(&mut *guard, ActivityWindow::new(now));
        drop(guard);
        drained.ended_at = now;
        drained
    }

    /// Number of samples waiting in the open window.
    pub fn pending(&self) -> usize {
        self.window.lock().event_count()
    }
}

impl Default for ActivityRecorder {
    fn default() -> Self {
        Self::new()
    }
}
