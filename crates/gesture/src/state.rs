//! Per-hand and lock state tracking

use hand_landmarks::{Handedness, Point};

use crate::pose::Pose;

/// Time-based refractory window, measured on frame timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cooldown {
    until_ms: Option<u64>,
}

impl Cooldown {
    /// Start (or restart) the window at `now_ms` for `duration_ms`
    pub fn start(&mut self, now_ms: u64, duration_ms: u64) {
        self.until_ms = Some(now_ms.saturating_add(duration_ms));
    }

    pub fn is_active(&self, now_ms: u64) -> bool {
        matches!(self.until_ms, Some(until) if now_ms < until)
    }
}

/// Gesture state for one hand (tracked over frames)
#[derive(Debug, Clone, PartialEq)]
pub struct HandState {
    /// Last tracked palm-center x for swipe detection
    pub last_x: Option<f32>,

    /// Refractory window for throttled gestures (Swipe, PinchMove)
    pub cooldown: Cooldown,

    /// Pose classified on the previous frame
    pub previous_pose: Pose,

    /// Palm x baseline while the hand is a fist
    pub fist_reference_x: Option<f32>,

    /// Pinch midpoint latched when the pinch started
    pub pinch_reference: Option<Point>,

    /// `Open` was the last event emitted for this hand
    pub released_sent: bool,

    /// A Fist->Open edge may fire. Cleared by a lock toggle so the fists
    /// used for the toggle do not also release.
    pub fist_edge_armed: bool,
}

impl Default for HandState {
    fn default() -> Self {
        Self {
            last_x: None,
            cooldown: Cooldown::default(),
            previous_pose: Pose::Open,
            fist_reference_x: None,
            pinch_reference: None,
            released_sent: false,
            fist_edge_armed: true,
        }
    }
}

impl HandState {
    /// Drop every position baseline (swipe, fist drag, pinch)
    pub fn clear_tracking(&mut self) {
        self.last_x = None;
        self.fist_reference_x = None;
        self.pinch_reference = None;
    }

    /// Reset state (hand lost or lock toggled)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The two hand slots, created lazily on first sighting
#[derive(Debug, Clone, Default)]
pub struct HandStates {
    left: Option<HandState>,
    right: Option<HandState>,
}

impl HandStates {
    fn slot(&mut self, hand: Handedness) -> &mut Option<HandState> {
        match hand {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    pub fn get(&self, hand: Handedness) -> Option<&HandState> {
        match hand {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
        }
    }

    /// State for `hand`, creating it on first use
    pub fn get_or_create(&mut self, hand: Handedness) -> &mut HandState {
        self.slot(hand).get_or_insert_with(HandState::default)
    }

    /// Forget a hand that left the frame
    pub fn remove(&mut self, hand: Handedness) -> bool {
        self.slot(hand).take().is_some()
    }

    /// Number of live hand states
    pub fn len(&self) -> usize {
        self.left.is_some() as usize + self.right.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset every live hand to defaults, keeping the slots
    pub fn reset_all(&mut self) {
        for state in [&mut self.left, &mut self.right].into_iter().flatten() {
            state.reset();
        }
    }
}

/// Two-hand lock state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    /// Per-hand gestures are suppressed while locked
    pub is_locked: bool,

    /// Refractory window after a toggle
    pub cooldown: Cooldown,

    /// Consecutive frames with both hands in a fist
    pub fist_hold_frames: u32,
}
