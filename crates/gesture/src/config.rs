//! Gesture classifier configuration

use serde::{Deserialize, Serialize};

use crate::GestureError;

/// Which family of gestures the target context consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureMode {
    /// Fist drag (FistMove) and release edge (FistToOpen): 3D object, slides
    #[default]
    Fist,
    /// Open-palm horizontal swipes
    Swipe,
    /// Thumb/index pinch hold and pinch flick
    Pinch,
}

/// Gesture classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Gesture family to evaluate per hand
    pub mode: GestureMode,

    /// Ignore hands whose index fingertip is below the wrist
    pub require_pointing_up: bool,

    /// Emit `Open` when a hand is released with no other gesture
    pub emit_release: bool,

    /// Curled fingers (of 4) needed to call a pose a fist
    pub min_curled_fingers: usize,

    /// Palm movement per frame that counts as a fist drag (normalized units)
    pub fist_move_sensitivity: f32,

    /// Palm movement per frame that counts as a swipe (normalized units)
    pub swipe_threshold: f32,

    /// Refractory period after a swipe (milliseconds)
    pub swipe_cooldown_ms: u64,

    /// Thumb/index tip distance below which the hand is pinching
    pub pinch_threshold: f32,

    /// Pinch midpoint travel that turns a hold into a PinchMove
    pub pinch_move_threshold: f32,

    /// Refractory period after a PinchMove (milliseconds)
    pub pinch_cooldown_ms: u64,

    /// Consecutive double-fist frames needed to toggle the lock
    pub lock_hold_frames: u32,

    /// Refractory period after a lock toggle (milliseconds)
    pub lock_cooldown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            mode: GestureMode::Fist,
            require_pointing_up: true,
            emit_release: true,
            min_curled_fingers: 2,
            fist_move_sensitivity: 0.01,
            swipe_threshold: 0.08,
            swipe_cooldown_ms: 500,
            pinch_threshold: 0.05,
            pinch_move_threshold: 0.1,
            pinch_cooldown_ms: 170,
            lock_hold_frames: 15,
            lock_cooldown_ms: 1300,
        }
    }
}

impl GestureConfig {
    /// Defaults tuned for one gesture family
    pub fn for_mode(mode: GestureMode) -> Self {
        match mode {
            GestureMode::Fist => Self::default(),
            GestureMode::Swipe | GestureMode::Pinch => Self {
                mode,
                require_pointing_up: false,
                emit_release: false,
                ..Default::default()
            },
        }
    }

    /// Create strict config (fewer false positives, slower to react)
    pub fn strict() -> Self {
        Self {
            min_curled_fingers: 3,
            fist_move_sensitivity: 0.02,
            swipe_threshold: 0.12,
            swipe_cooldown_ms: 800,
            pinch_threshold: 0.035,
            lock_hold_frames: 25,
            ..Default::default()
        }
    }

    /// Create lenient config (reacts to smaller motions)
    pub fn lenient() -> Self {
        Self {
            fist_move_sensitivity: 0.005,
            swipe_threshold: 0.06,
            swipe_cooldown_ms: 300,
            pinch_threshold: 0.06,
            lock_hold_frames: 10,
            ..Default::default()
        }
    }

    /// Reject values the state machine cannot work with
    pub fn validate(&self) -> Result<(), GestureError> {
        if !(1..=4).contains(&self.min_curled_fingers) {
            return Err(GestureError::Config(format!(
                "min_curled_fingers must be within 1..=4, got {}",
                self.min_curled_fingers
            )));
        }

        let thresholds = [
            ("fist_move_sensitivity", self.fist_move_sensitivity),
            ("swipe_threshold", self.swipe_threshold),
            ("pinch_threshold", self.pinch_threshold),
            ("pinch_move_threshold", self.pinch_move_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(GestureError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.lock_hold_frames == 0 {
            return Err(GestureError::Config(
                "lock_hold_frames must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
