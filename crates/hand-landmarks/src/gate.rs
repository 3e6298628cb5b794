//! Frame admission: FPS cap and stale-frame dropping
//!
//! Frames are never queued. A frame that arrives before the minimum interval
//! has elapsed, or that carries a timestamp the gate has already seen, is
//! dropped.

use std::time::{Duration, Instant};

/// Frame-rate cap plus stale-frame filter
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval: Duration,
    last_admitted: Option<Instant>,
    last_timestamp_ms: Option<u64>,
}

impl FrameGate {
    /// Create a gate that admits at most `max_fps` frames per second (0 = uncapped)
    pub fn new(max_fps: u32) -> Self {
        let min_interval = if max_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / max_fps as f64)
        };
        Self {
            min_interval,
            last_admitted: None,
            last_timestamp_ms: None,
        }
    }

    /// Minimum time between two admitted frames
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether enough time has passed to run the detector again.
    /// Records `now` as the start of a new frame when it returns true.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_admitted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_admitted = Some(now);
        true
    }

    /// Whether a result carries a frame the gate has not processed yet
    pub fn is_fresh(&mut self, timestamp_ms: u64) -> bool {
        match self.last_timestamp_ms {
            Some(last) if timestamp_ms <= last => false,
            _ => {
                self.last_timestamp_ms = Some(timestamp_ms);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
        self.last_timestamp_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fps_cap() {
        let mut gate = FrameGate::new(30);
        let start = Instant::now();

        assert!(gate.try_begin(start));
        assert!(!gate.try_begin(start + Duration::from_millis(10)));
        assert!(gate.try_begin(start + Duration::from_millis(34)));
    }

    #[test]
    fn test_uncapped() {
        let mut gate = FrameGate::new(0);
        let now = Instant::now();
        assert!(gate.try_begin(now));
        assert!(gate.try_begin(now));
    }

    #[test]
    fn test_stale_frames_dropped() {
        let mut gate = FrameGate::new(30);
        assert!(gate.is_fresh(100));
        assert!(!gate.is_fresh(100));
        assert!(!gate.is_fresh(90));
        assert!(gate.is_fresh(133));

        gate.reset();
        assert!(gate.is_fresh(0));
    }

    proptest! {
        #[test]
        fn prop_admitted_timestamps_strictly_increase(
            timestamps in proptest::collection::vec(0u64..1_000, 0..64)
        ) {
            let mut gate = FrameGate::new(30);
            let mut last = None;
            for ts in timestamps {
                let fresh = gate.is_fresh(ts);
                prop_assert_eq!(fresh, last.map_or(true, |l| ts > l));
                if fresh {
                    last = Some(ts);
                }
            }
        }
    }
}
