//! Gesture events and per-frame analysis results

use hand_landmarks::{Handedness, Point};
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Horizontal direction of a swipe or pinch flick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Direction of a horizontal delta (positive x is right)
    pub fn from_delta(delta_x: f32) -> Self {
        if delta_x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    }
}

/// Discrete gesture event, serialized with a `type` tag for subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureEvent {
    /// Fast horizontal open-palm movement
    Swipe {
        hand: Handedness,
        direction: Direction,
    },

    /// Per-frame palm movement while holding a fist
    FistMove {
        hand: Handedness,
        #[serde(rename = "deltaX")]
        delta_x: f32,
    },

    /// Hand opened after being a fist
    FistToOpen { hand: Handedness },

    /// Pinch held in place
    PinchHold { distance: f32, midpoint: Point },

    /// Pinch flicked sideways
    PinchMove { direction: Direction },

    /// Hand released, no gesture active
    Open,

    /// Both-fists hold toggled the lock
    #[serde(rename = "system_lock")]
    LockToggle {
        #[serde(rename = "isLocked")]
        is_locked: bool,
    },
}

impl GestureEvent {
    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            GestureEvent::Swipe { .. } => "swipe",
            GestureEvent::FistMove { .. } => "fist_move",
            GestureEvent::FistToOpen { .. } => "fist_to_open",
            GestureEvent::PinchHold { .. } => "pinch_hold",
            GestureEvent::PinchMove { .. } => "pinch_move",
            GestureEvent::Open => "open",
            GestureEvent::LockToggle { .. } => "system_lock",
        }
    }

    /// Hand the event belongs to, when the payload names one
    pub fn hand(&self) -> Option<Handedness> {
        match self {
            GestureEvent::Swipe { hand, .. }
            | GestureEvent::FistMove { hand, .. }
            | GestureEvent::FistToOpen { hand } => Some(*hand),
            GestureEvent::PinchHold { .. }
            | GestureEvent::PinchMove { .. }
            | GestureEvent::Open
            | GestureEvent::LockToggle { .. } => None,
        }
    }

    /// Continuous signals fire every qualifying frame
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            GestureEvent::FistMove { .. } | GestureEvent::PinchHold { .. }
        )
    }
}

/// Pose classified for one hand in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPose {
    pub hand: Handedness,
    pub pose: Pose,
}

/// Complete classifier output for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Frame timestamp (milliseconds)
    pub timestamp_ms: u64,

    /// Valid hands considered this frame (after same-label collapse)
    pub poses: Vec<HandPose>,

    /// Lock state after this frame
    pub is_locked: bool,

    /// Events to forward, at most one per hand (or a lone LockToggle)
    pub events: Vec<GestureEvent>,
}

impl FrameAnalysis {
    /// Check if any events were produced
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Number of hands classified as fists
    pub fn fist_count(&self) -> usize {
        self.poses.iter().filter(|p| p.pose == Pose::Fist).count()
    }
}
