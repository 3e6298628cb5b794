//! Hand Landmark Library for Gesture Control
//!
//! Provides the data model produced by an external hand-landmark detector
//! and the sources that feed it into the gesture pipeline:
//! - 21-point hand landmarks with handedness (MediaPipe index convention)
//! - JSON-lines sources (recorded replays or a detector subprocess)
//! - Frame-rate cap and stale-frame dropping

pub mod frame;
pub mod gate;
pub mod landmark;
pub mod source;

pub use frame::{DetectionResult, HandObservation, Handedness};
pub use gate::FrameGate;
pub use landmark::{map_range, Landmark, Point, LANDMARK_COUNT};
pub use source::{JsonLinesSource, LandmarkSource, ScriptedSource};

use thiserror::Error;

/// Landmark source error types
#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Failed to open landmark source: {0}")]
    Open(String),

    #[error("Failed to read from landmark source: {0}")]
    Read(String),

    #[error("Malformed detection result on line {line}: {reason}")]
    Decode { line: u64, reason: String },

    #[error("Detector process error: {0}")]
    Detector(String),
}

impl From<std::io::Error> for LandmarkError {
    fn from(err: std::io::Error) -> Self {
        LandmarkError::Read(err.to_string())
    }
}
