//! Gesture Classifier
//!
//! Turns a noisy per-frame stream of hand landmarks into discrete,
//! debounced gesture events:
//! - Fist/open pose classification and orientation gating
//! - Continuous fist drag and edge-triggered fist release
//! - Open-palm swipes and pinch hold/flick with cooldowns
//! - Two-hand fist hold that toggles a lock

pub mod config;
pub mod event;
pub mod pose;
pub mod state;

pub use config::{GestureConfig, GestureMode};
pub use event::{Direction, FrameAnalysis, GestureEvent, HandPose};
pub use pose::{classify_pose, classify_pose_with, is_pointing_up, Pose};
pub use state::{Cooldown, HandState, HandStates, LockState};

use hand_landmarks::{DetectionResult, HandObservation, Handedness};
use thiserror::Error;
use tracing::{debug, info};

/// Gesture error types
#[derive(Error, Debug)]
pub enum GestureError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Frame-driven gesture state machine
///
/// Owns every piece of per-hand and lock state; nothing else mutates it.
pub struct GestureClassifier {
    config: GestureConfig,
    hands: HandStates,
    lock: LockState,
}

impl GestureClassifier {
    /// Create a classifier with a validated configuration
    pub fn new(config: GestureConfig) -> Result<Self, GestureError> {
        config.validate()?;
        info!("Creating gesture classifier in {:?} mode", config.mode);
        Ok(Self {
            config,
            hands: HandStates::default(),
            lock: LockState::default(),
        })
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked
    }

    pub fn lock_state(&self) -> &LockState {
        &self.lock
    }

    pub fn hand_state(&self, hand: Handedness) -> Option<&HandState> {
        self.hands.get(hand)
    }

    /// Analyze one frame of detections
    pub fn process(&mut self, frame: &DetectionResult) -> FrameAnalysis {
        let now = frame.timestamp_ms;

        let skipped = frame.hands.len() - frame.valid_hands().count();
        if skipped > 0 {
            debug!("Skipping {} hand(s) with an incomplete landmark set", skipped);
        }

        // Same-label hands collapse into one slot, last detected wins
        let mut observed: Vec<&HandObservation> = Vec::with_capacity(2);
        for hand in frame.valid_hands() {
            match observed.iter_mut().find(|h| h.handedness == hand.handedness) {
                Some(slot) => *slot = hand,
                None => observed.push(hand),
            }
        }

        for hand in [Handedness::Left, Handedness::Right] {
            if !observed.iter().any(|h| h.handedness == hand) && self.hands.remove(hand) {
                debug!("{} hand lost, state reset", hand);
            }
        }

        let poses: Vec<HandPose> = observed
            .iter()
            .map(|h| HandPose {
                hand: h.handedness,
                pose: classify_pose_with(&h.landmarks, self.config.min_curled_fingers),
            })
            .collect();

        let mut analysis = FrameAnalysis {
            timestamp_ms: now,
            poses,
            ..Default::default()
        };

        if let Some(toggle) = self.update_lock(now, &analysis.poses) {
            analysis.events.push(toggle);
            analysis.is_locked = self.lock.is_locked;
            return analysis;
        }

        for (observation, hand_pose) in observed.iter().zip(analysis.poses.iter()) {
            let state = self.hands.get_or_create(hand_pose.hand);

            if self.lock.is_locked {
                state.previous_pose = hand_pose.pose;
                state.clear_tracking();
                continue;
            }

            if let Some(event) = evaluate_hand(&self.config, state, observation, hand_pose.pose, now) {
                debug!("{} hand: {:?}", hand_pose.hand, event);
                analysis.events.push(event);
            }
        }

        analysis.is_locked = self.lock.is_locked;
        analysis
    }

    /// Advance the double-fist hold; returns the toggle event when it completes
    fn update_lock(&mut self, now: u64, poses: &[HandPose]) -> Option<GestureEvent> {
        let fists = poses.iter().filter(|p| p.pose == Pose::Fist).count();

        if fists != 2 {
            if self.lock.fist_hold_frames > 0 {
                debug!("Double-fist hold interrupted after {} frames", self.lock.fist_hold_frames);
            }
            self.lock.fist_hold_frames = 0;
            return None;
        }

        if self.lock.cooldown.is_active(now) {
            return None;
        }

        self.lock.fist_hold_frames += 1;
        if self.lock.fist_hold_frames < self.config.lock_hold_frames {
            return None;
        }

        self.lock.is_locked = !self.lock.is_locked;
        self.lock.cooldown.start(now, self.config.lock_cooldown_ms);
        self.lock.fist_hold_frames = 0;

        self.hands.reset_all();
        for hand in poses {
            self.hands.get_or_create(hand.hand).fist_edge_armed = false;
        }

        info!("System lock toggled: locked={}", self.lock.is_locked);
        Some(GestureEvent::LockToggle {
            is_locked: self.lock.is_locked,
        })
    }

    /// Reset all state (new session)
    pub fn reset(&mut self) {
        self.hands = HandStates::default();
        self.lock = LockState::default();
    }
}

/// Run the per-hand state machine for one observed hand
fn evaluate_hand(
    config: &GestureConfig,
    state: &mut HandState,
    hand: &HandObservation,
    pose: Pose,
    now: u64,
) -> Option<GestureEvent> {
    if config.require_pointing_up && !is_pointing_up(&hand.landmarks) {
        // Resting posture: neutral pose, no baselines
        state.clear_tracking();
        state.previous_pose = Pose::Open;
        return release_signal(config, state);
    }

    let event = match config.mode {
        GestureMode::Fist => track_fist(config, state, hand, pose),
        GestureMode::Swipe => track_swipe(config, state, hand, pose, now),
        GestureMode::Pinch => track_pinch(config, state, hand, pose, now),
    };

    match event {
        Some(event) => {
            state.released_sent = false;
            Some(event)
        }
        None if pose == Pose::Open => release_signal(config, state),
        None => None,
    }
}

/// `Open` once per entry into the released condition
fn release_signal(config: &GestureConfig, state: &mut HandState) -> Option<GestureEvent> {
    if !config.emit_release || state.released_sent {
        return None;
    }
    state.released_sent = true;
    Some(GestureEvent::Open)
}

fn track_fist(
    config: &GestureConfig,
    state: &mut HandState,
    hand: &HandObservation,
    pose: Pose,
) -> Option<GestureEvent> {
    match pose {
        Pose::Fist => {
            state.previous_pose = Pose::Fist;
            let x = hand.palm_center()?.x;

            // Reference rolls forward every frame: instantaneous delta, no cooldown
            let event = state.fist_reference_x.and_then(|reference| {
                let delta_x = x - reference;
                (delta_x.abs() > config.fist_move_sensitivity).then_some(GestureEvent::FistMove {
                    hand: hand.handedness,
                    delta_x,
                })
            });
            state.fist_reference_x = Some(x);
            event
        }
        Pose::Open => {
            let was_fist = state.previous_pose == Pose::Fist;
            let armed = state.fist_edge_armed;
            state.previous_pose = Pose::Open;
            state.fist_reference_x = None;
            state.fist_edge_armed = true;

            (was_fist && armed).then_some(GestureEvent::FistToOpen {
                hand: hand.handedness,
            })
        }
    }
}

fn track_swipe(
    config: &GestureConfig,
    state: &mut HandState,
    hand: &HandObservation,
    pose: Pose,
    now: u64,
) -> Option<GestureEvent> {
    state.previous_pose = pose;
    if pose == Pose::Fist {
        state.last_x = None;
        return None;
    }

    if state.cooldown.is_active(now) {
        return None;
    }

    let x = hand.palm_center()?.x;
    if let Some(last_x) = state.last_x {
        let delta_x = x - last_x;
        if delta_x.abs() > config.swipe_threshold {
            // Force re-acquisition after the refractory window
            state.cooldown.start(now, config.swipe_cooldown_ms);
            state.last_x = None;
            return Some(GestureEvent::Swipe {
                hand: hand.handedness,
                direction: Direction::from_delta(delta_x),
            });
        }
    }

    state.last_x = Some(x);
    None
}

fn track_pinch(
    config: &GestureConfig,
    state: &mut HandState,
    hand: &HandObservation,
    pose: Pose,
    now: u64,
) -> Option<GestureEvent> {
    state.previous_pose = pose;
    let (distance, midpoint) = hand.pinch()?;

    if distance >= config.pinch_threshold {
        if state.pinch_reference.take().is_some() {
            debug!("{} hand: pinch released", hand.handedness);
        }
        return None;
    }

    if state.cooldown.is_active(now) {
        return None;
    }

    let Some(reference) = state.pinch_reference else {
        state.pinch_reference = Some(midpoint);
        return None;
    };

    let delta_x = midpoint.x - reference.x;
    if delta_x.abs() > config.pinch_move_threshold {
        state.pinch_reference = None;
        state.cooldown.start(now, config.pinch_cooldown_ms);
        return Some(GestureEvent::PinchMove {
            direction: Direction::from_delta(delta_x),
        });
    }

    Some(GestureEvent::PinchHold { distance, midpoint })
}
