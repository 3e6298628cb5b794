//! Detection results and hand observations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::landmark::{index, Landmark, Point, LANDMARK_COUNT};

/// Which hand the detector believes it saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected hand in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    /// Landmarks in detector index order (21 for a valid hand)
    pub landmarks: Vec<Landmark>,
    /// Left/right label
    pub handedness: Handedness,
    /// Handedness confidence (0-1)
    #[serde(default)]
    pub confidence: f32,
}

impl HandObservation {
    /// Create an observation from a landmark list
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            handedness,
            confidence: 1.0,
        }
    }

    /// A hand is only usable with the full landmark set
    pub fn is_valid(&self) -> bool {
        self.landmarks.len() == LANDMARK_COUNT
    }

    /// Landmark by index, if present
    pub fn landmark(&self, idx: usize) -> Option<&Landmark> {
        self.landmarks.get(idx)
    }

    /// Palm-center position (landmark 9)
    pub fn palm_center(&self) -> Option<&Landmark> {
        self.landmark(index::PALM_CENTER)
    }

    /// Thumb-tip to index-tip distance and midpoint
    pub fn pinch(&self) -> Option<(f32, Point)> {
        let thumb = self.landmark(index::THUMB_TIP)?;
        let tip = self.landmark(index::INDEX_TIP)?;
        Some((thumb.distance_xy(tip), thumb.midpoint(tip)))
    }

    /// Thumb-tip to pinky-tip span, a rough proxy for distance from the camera
    pub fn hand_width(&self) -> Option<f32> {
        let thumb = self.landmark(index::THUMB_TIP)?;
        let pinky = self.landmark(index::PINKY_TIP)?;
        Some(thumb.distance_xy(pinky))
    }
}

/// Output of one detector call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Monotonic frame timestamp (milliseconds)
    pub timestamp_ms: u64,
    /// Detected hands (0-2); empty means no hands
    #[serde(default)]
    pub hands: Vec<HandObservation>,
}

impl DetectionResult {
    /// Create a detection result
    pub fn new(timestamp_ms: u64, hands: Vec<HandObservation>) -> Self {
        Self { timestamp_ms, hands }
    }

    /// Result with no hands
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            hands: Vec::new(),
        }
    }

    /// Hands with a complete landmark set
    pub fn valid_hands(&self) -> impl Iterator<Item = &HandObservation> {
        self.hands.iter().filter(|h| h.is_valid())
    }
}
