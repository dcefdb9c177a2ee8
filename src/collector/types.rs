//! Input event types produced by the platform collectors.
//!
//! Only pointer positions and key-press timing are captured. Key codes and
//! characters never leave the hook callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An absolute pointer position in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - earlier`.
    pub fn delta_from(&self, earlier: &PointerPosition) -> (f64, f64) {
        (self.x - earlier.x, self.y - earlier.y)
    }
}

/// A pointer movement to an absolute position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointerMoveEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Where the pointer ended up
    pub position: PointerPosition,
}

impl PointerMoveEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            position: PointerPosition::new(x, y),
        }
    }
}

/// A key press, timing only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPressEvent {
    /// Timestamp when the key went down
    pub timestamp: DateTime<Utc>,
}

impl KeyPressEvent {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}

impl Default for KeyPressEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified event type for the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputEvent {
    PointerMove(PointerMoveEvent),
    KeyPress(KeyPressEvent),
}

impl InputEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            InputEvent::PointerMove(e) => e.timestamp,
            InputEvent::KeyPress(e) => e.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_delta() {
        let a = PointerPosition::new(1.0, 1.0);
        let b = PointerPosition::new(4.0, -1.0);
        assert_eq!(b.delta_from(&a), (3.0, -2.0));
    }

    #[test]
    fn test_event_timestamp() {
        let event = InputEvent::PointerMove(PointerMoveEvent::new(10.0, 20.0));
        assert!(event.timestamp() <= Utc::now());

        let key = InputEvent::KeyPress(KeyPressEvent::new());
        assert!(key.timestamp() <= Utc::now());
    }
}
