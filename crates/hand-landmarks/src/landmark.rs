//! Landmark points and hand geometry

use serde::{Deserialize, Serialize};

/// Number of landmarks a detector reports for one hand
pub const LANDMARK_COUNT: usize = 21;

/// Landmark indices (MediaPipe hand landmarker convention)
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    /// Palm-center reference point (base of the middle finger)
    pub const PALM_CENTER: usize = MIDDLE_MCP;

    /// (tip, mcp) pairs of the four non-thumb fingers
    pub const FINGERS: [(usize, usize); 4] = [
        (INDEX_TIP, INDEX_MCP),
        (MIDDLE_TIP, MIDDLE_MCP),
        (RING_TIP, RING_MCP),
        (PINKY_TIP, PINKY_MCP),
    ];
}

/// A single tracked point, normalized to the frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// X coordinate (0.0 to 1.0, left to right)
    pub x: f32,
    /// Y coordinate (0.0 to 1.0, grows downward)
    pub y: f32,
    /// Relative depth, when the detector reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Landmark {
    /// Create a 2D landmark
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    /// Euclidean distance in the normalized xy plane
    pub fn distance_xy(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint in the normalized xy plane
    pub fn midpoint(&self, other: &Landmark) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Normalized 2D point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Map `value` from `[in_min, in_max]` onto `[out_min, out_max]`, clamping the input first.
///
/// Consumers use this to turn a pinch distance into a scale, or a pinch
/// midpoint into a rotation.
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if (in_max - in_min).abs() < f32::EPSILON {
        return out_min;
    }
    let (lo, hi) = if in_min <= in_max { (in_min, in_max) } else { (in_max, in_min) };
    let clamped = value.clamp(lo, hi);
    (clamped - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_and_midpoint() {
        let thumb = Landmark::new(0.50, 0.50);
        let index = Landmark::new(0.52, 0.51);

        let distance = thumb.distance_xy(&index);
        assert!((distance - 0.02236).abs() < 1e-4);

        let mid = thumb.midpoint(&index);
        assert!((mid.x - 0.51).abs() < 1e-6);
        assert!((mid.y - 0.505).abs() < 1e-6);
    }

    #[test]
    fn test_map_range_clamps() {
        // Closer fingers give a bigger object
        assert!((map_range(0.01, 0.01, 0.05, 2.0, 0.5) - 2.0).abs() < 1e-6);
        assert!((map_range(0.05, 0.01, 0.05, 2.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((map_range(0.50, 0.01, 0.05, 2.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((map_range(0.5, 0.2, 0.8, -1.0, 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_map_range_degenerate_input() {
        assert_eq!(map_range(0.3, 0.5, 0.5, 1.0, 2.0), 1.0);
    }

    #[test]
    fn test_landmark_json_without_depth() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.25,"y":0.75}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.25, 0.75));
        assert_eq!(serde_json::to_string(&lm).unwrap(), r#"{"x":0.25,"y":0.75}"#);
    }

    proptest! {
        #[test]
        fn prop_map_range_stays_in_output_range(
            value in -2.0f32..2.0,
            in_min in 0.0f32..0.5,
            span in 0.01f32..0.5,
            out_a in -10.0f32..10.0,
            out_b in -10.0f32..10.0,
        ) {
            let mapped = map_range(value, in_min, in_min + span, out_a, out_b);
            let (lo, hi) = if out_a <= out_b { (out_a, out_b) } else { (out_b, out_a) };
            prop_assert!(
                mapped >= lo - 1e-3 && mapped <= hi + 1e-3,
                "{} outside [{}, {}]",
                mapped,
                lo,
                hi
            );
        }
    }
}
