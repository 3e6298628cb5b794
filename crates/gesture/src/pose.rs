//! Hand pose classification and orientation gate

use hand_landmarks::landmark::index;
use hand_landmarks::Landmark;
use serde::{Deserialize, Serialize};

/// Binary hand shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pose {
    #[default]
    Open,
    Fist,
}

/// Curled-finger count used when no configuration is at hand
pub const DEFAULT_MIN_CURLED: usize = 2;

/// Count index/middle/ring/pinky fingers whose tip sits below their own MCP.
///
/// Fingers with a missing tip or MCP are skipped.
pub fn curled_fingers(landmarks: &[Landmark]) -> usize {
    index::FINGERS
        .iter()
        .filter_map(|&(tip, mcp)| Some((landmarks.get(tip)?, landmarks.get(mcp)?)))
        .filter(|(tip, mcp)| tip.y > mcp.y)
        .count()
}

/// Classify with the default threshold (2 of 4 fingers curled)
pub fn classify_pose(landmarks: &[Landmark]) -> Pose {
    classify_pose_with(landmarks, DEFAULT_MIN_CURLED)
}

/// Classify as Fist when at least `min_curled` fingers are curled
pub fn classify_pose_with(landmarks: &[Landmark], min_curled: usize) -> Pose {
    if min_curled > 0 && curled_fingers(landmarks) >= min_curled {
        Pose::Fist
    } else {
        Pose::Open
    }
}

/// Index fingertip above the wrist. Missing data reads as not pointing up.
pub fn is_pointing_up(landmarks: &[Landmark]) -> bool {
    match (landmarks.get(index::WRIST), landmarks.get(index::INDEX_TIP)) {
        (Some(wrist), Some(tip)) => tip.y < wrist.y,
        _ => false,
    }
}
