//! Frame loop
//!
//! One task owns the classifier. Each iteration pulls a detection result,
//! filters it through the frame gate, classifies it, and hands any events to
//! the emitter. Detector and sink failures are logged and the loop moves on.

use std::future::Future;
use std::time::Duration;

use event_relay::{EventEmitter, EventSink};
use gesture::{FrameAnalysis, GestureClassifier};
use hand_landmarks::{DetectionResult, FrameGate, LandmarkSource};
use metrics::counter;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How the loop keeps to the frame-rate cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Wait for the next tick before reading (recorded replays)
    Paced,
    /// Read as fast as the source delivers and drop over-rate frames (live detectors)
    Live,
}

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Results read from the source
    pub frames_read: u64,
    /// Results that reached the classifier
    pub frames_processed: u64,
    /// Results dropped as over-rate or stale
    pub frames_dropped: u64,
    /// Source reads that failed
    pub source_errors: u64,
    /// Events the sink accepted
    pub events_emitted: u64,
}

/// Source, classifier and emitter wired into one loop
pub struct GestureSession<S, K> {
    source: S,
    classifier: GestureClassifier,
    emitter: EventEmitter<K>,
    gate: FrameGate,
    pacing: Pacing,
    stats: SessionStats,
}

impl<S: LandmarkSource, K: EventSink> GestureSession<S, K> {
    pub fn new(
        source: S,
        classifier: GestureClassifier,
        emitter: EventEmitter<K>,
        max_fps: u32,
        pacing: Pacing,
    ) -> Self {
        Self {
            source,
            classifier,
            emitter,
            gate: FrameGate::new(max_fps),
            pacing,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn emitter(&self) -> &EventEmitter<K> {
        &self.emitter
    }

    /// Take the source and sink back (e.g. to stop a detector or close a broker link)
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.emitter.into_sink())
    }

    /// Run until the source is exhausted or `shutdown` resolves
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> SessionStats {
        info!(
            "Starting gesture session (room: {}, pacing: {:?}, frame interval: {:?})",
            self.emitter.room(),
            self.pacing,
            self.gate.min_interval()
        );

        let mut ticker = self.ticker();
        tokio::pin!(shutdown);

        loop {
            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {}
                }
            }

            let next = tokio::select! {
                _ = &mut shutdown => break,
                next = self.source.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    self.stats.frames_read += 1;
                    self.handle_frame(frame).await;
                }
                Ok(None) => {
                    info!("Landmark source exhausted");
                    break;
                }
                Err(e) => {
                    self.stats.source_errors += 1;
                    counter!("gesture_source_errors_total").increment(1);
                    warn!("Skipping frame: {}", e);

                    // A failing live source must not spin; paced runs wait on the ticker
                    if self.pacing == Pacing::Live {
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = error_pause(self.gate.min_interval()) => {}
                        }
                    }
                }
            }
        }

        info!(
            "Gesture session stopped: {} frames processed, {} dropped, {} events emitted",
            self.stats.frames_processed, self.stats.frames_dropped, self.stats.events_emitted
        );
        self.stats
    }

    /// Classify one detection result and emit its events
    pub async fn handle_frame(&mut self, frame: DetectionResult) -> Option<FrameAnalysis> {
        if !self.admit(&frame) {
            self.stats.frames_dropped += 1;
            counter!("gesture_frames_dropped_total").increment(1);
            return None;
        }

        let analysis = self.classifier.process(&frame);
        self.stats.frames_processed += 1;
        counter!("gesture_frames_processed_total").increment(1);

        // Emitted even when empty: a drag that just ended may still owe distance
        let sent = self.emitter.emit(&analysis).await;
        self.stats.events_emitted += sent as u64;
        Some(analysis)
    }

    fn admit(&mut self, frame: &DetectionResult) -> bool {
        if self.pacing == Pacing::Live && !self.gate.try_begin(Instant::now().into_std()) {
            debug!("Dropping over-rate frame at {} ms", frame.timestamp_ms);
            return false;
        }
        if !self.gate.is_fresh(frame.timestamp_ms) {
            debug!("Dropping stale frame at {} ms", frame.timestamp_ms);
            return false;
        }
        true
    }

    fn ticker(&self) -> Option<Interval> {
        let period = self.gate.min_interval();
        if self.pacing != Pacing::Paced || period == Duration::ZERO {
            return None;
        }
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }
}

async fn error_pause(pause: Duration) {
    if pause.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_relay::{ChannelSink, ControlMessage, RoomCode};
    use gesture::{GestureConfig, GestureEvent, GestureMode, Pose};
    use hand_landmarks::landmark::index;
    use hand_landmarks::{HandObservation, Handedness, Landmark, LandmarkError, ScriptedSource, LANDMARK_COUNT};
    use tokio::sync::broadcast;

    fn hand(handedness: Handedness, pose: Pose, palm_x: f32) -> HandObservation {
        let mut landmarks = vec![Landmark::new(palm_x, 0.5); LANDMARK_COUNT];
        landmarks[index::WRIST] = Landmark::new(palm_x, 0.9);
        landmarks[index::THUMB_TIP] = Landmark::new(palm_x - 0.15, 0.5);
        let tip_y = if pose == Pose::Fist { 0.6 } else { 0.2 };
        for (tip, _) in index::FINGERS {
            landmarks[tip].y = tip_y;
        }
        HandObservation::new(handedness, landmarks)
    }

    fn session(
        frames: Vec<Result<DetectionResult, LandmarkError>>,
        config: GestureConfig,
        max_fps: u32,
        pacing: Pacing,
    ) -> (GestureSession<ScriptedSource, ChannelSink>, broadcast::Receiver<ControlMessage>) {
        let sink = ChannelSink::new(256);
        let rx = sink.subscribe();
        let emitter = EventEmitter::new(sink, RoomCode::new("48213").unwrap());
        let classifier = GestureClassifier::new(config).unwrap();
        let session = GestureSession::new(ScriptedSource::new(frames), classifier, emitter, max_fps, pacing);
        (session, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<ControlMessage>) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            events.push(message.event);
        }
        events
    }

    #[tokio::test]
    async fn test_session_runs_to_end_of_source() {
        let right = Handedness::Right;
        let frames = vec![
            Ok(DetectionResult::new(0, vec![hand(right, Pose::Open, 0.5)])),
            Ok(DetectionResult::new(33, vec![hand(right, Pose::Fist, 0.5)])),
            Ok(DetectionResult::new(66, vec![hand(right, Pose::Fist, 0.55)])),
            Ok(DetectionResult::new(99, vec![hand(right, Pose::Open, 0.55)])),
        ];
        let (mut session, mut rx) = session(frames, GestureConfig::default(), 0, Pacing::Live);

        let stats = session.run(std::future::pending()).await;
        assert_eq!(stats.frames_read, 4);
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.events_emitted, 3);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], GestureEvent::Open);
        assert!(matches!(events[1], GestureEvent::FistMove { hand: Handedness::Right, .. }));
        assert_eq!(events[2], GestureEvent::FistToOpen { hand: right });
    }

    #[tokio::test]
    async fn test_detector_errors_do_not_stop_loop() {
        let left = Handedness::Left;
        let frames = vec![
            Ok(DetectionResult::new(0, vec![hand(left, Pose::Open, 0.3)])),
            Err(LandmarkError::Read("pipe closed".to_string())),
            Err(LandmarkError::Decode {
                line: 3,
                reason: "expected value".to_string(),
            }),
            Ok(DetectionResult::new(99, vec![hand(left, Pose::Open, 0.5)])),
        ];
        let config = GestureConfig::for_mode(GestureMode::Swipe);
        let (mut session, mut rx) = session(frames, config, 0, Pacing::Live);

        let stats = session.run(std::future::pending()).await;
        assert_eq!(stats.source_errors, 2);
        assert_eq!(stats.frames_processed, 2);
        assert!(matches!(drain(&mut rx).as_slice(), [GestureEvent::Swipe { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_source_errors_back_off() {
        let frames = (0..3)
            .map(|_| Err(LandmarkError::Read("pipe closed".to_string())))
            .collect();
        let (mut session, _rx) = session(frames, GestureConfig::default(), 10, Pacing::Live);

        let started = Instant::now();
        let stats = session.run(std::future::pending()).await;
        assert_eq!(stats.source_errors, 3);
        // One frame interval (100 ms) after each failure
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_throttled_drag_adds_up_to_hand_travel() {
        let config = crate::SessionConfig::default();
        let right = Handedness::Right;

        // 31 fist frames moving +0.02 each, then the fist opens
        let mut frames: Vec<_> = (0..31u64)
            .map(|n| {
                Ok(DetectionResult::new(
                    n * 33,
                    vec![hand(right, Pose::Fist, 0.1 + 0.02 * n as f32)],
                ))
            })
            .collect();
        frames.push(Ok(DetectionResult::new(31 * 33, vec![hand(right, Pose::Open, 0.7)])));

        let sink = ChannelSink::new(256);
        let mut rx = sink.subscribe();
        let emitter = EventEmitter::new(sink, RoomCode::new("48213").unwrap())
            .with_continuous_interval(config.emit_interval_ms);
        let classifier = GestureClassifier::new(config.gesture.clone()).unwrap();
        let mut session =
            GestureSession::new(ScriptedSource::new(frames), classifier, emitter, 0, Pacing::Live);
        session.run(std::future::pending()).await;

        let events = drain(&mut rx);
        let drags = events
            .iter()
            .filter(|e| matches!(e, GestureEvent::FistMove { .. }))
            .count();
        let travel: f32 = events
            .iter()
            .map(|e| match e {
                GestureEvent::FistMove { delta_x, .. } => *delta_x,
                _ => 0.0,
            })
            .sum();
        assert!(drags < 30);
        assert!((travel - 0.60).abs() < 1e-3, "relayed travel {}", travel);
        assert_eq!(events.last(), Some(&GestureEvent::FistToOpen { hand: right }));
    }

    #[tokio::test]
    async fn test_stale_frames_dropped() {
        let right = Handedness::Right;
        let frames = vec![
            Ok(DetectionResult::new(100, vec![hand(right, Pose::Fist, 0.5)])),
            Ok(DetectionResult::new(100, vec![hand(right, Pose::Fist, 0.7)])),
            Ok(DetectionResult::new(90, vec![hand(right, Pose::Fist, 0.7)])),
            Ok(DetectionResult::new(133, vec![hand(right, Pose::Fist, 0.52)])),
        ];
        let (mut session, mut rx) = session(frames, GestureConfig::default(), 0, Pacing::Live);

        let stats = session.run(std::future::pending()).await;
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.frames_processed, 2);

        // The repeated frames never moved the drag reference
        match drain(&mut rx).as_slice() {
            [GestureEvent::FistMove { delta_x, .. }] => assert!((delta_x - 0.02).abs() < 1e-5),
            other => panic!("expected one FistMove, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_pacing_drops_over_rate_frames() {
        let (mut session, _rx) = session(Vec::new(), GestureConfig::default(), 10, Pacing::Live);

        let right = Handedness::Right;
        assert!(session
            .handle_frame(DetectionResult::new(0, vec![hand(right, Pose::Open, 0.5)]))
            .await
            .is_some());
        // 20 ms later: inside the 100 ms frame budget
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(session
            .handle_frame(DetectionResult::new(20, vec![hand(right, Pose::Open, 0.5)]))
            .await
            .is_none());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(session
            .handle_frame(DetectionResult::new(120, vec![hand(right, Pose::Open, 0.5)]))
            .await
            .is_some());
        assert_eq!(session.stats().frames_dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_replay_processes_every_frame() {
        let frames = (0..10u64)
            .map(|n| Ok(DetectionResult::new(n * 33, Vec::new())))
            .collect();
        let (mut session, _rx) = session(frames, GestureConfig::default(), 30, Pacing::Paced);

        let started = Instant::now();
        let stats = session.run(std::future::pending()).await;
        assert_eq!(stats.frames_processed, 10);
        assert_eq!(stats.frames_dropped, 0);
        // First tick is immediate, nine more at ~33 ms
        assert!(started.elapsed() >= Duration::from_millis(290));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let frames = (0..100u64)
            .map(|n| Ok(DetectionResult::new(n * 100, Vec::new())))
            .collect();
        let (mut session, _rx) = session(frames, GestureConfig::default(), 10, Pacing::Paced);

        let stats = session
            .run(tokio::time::sleep(Duration::from_millis(450)))
            .await;
        // Ticks at 0, 100, 200, 300, 400
        assert_eq!(stats.frames_processed, 5);
    }

    #[tokio::test]
    async fn test_lock_toggle_reaches_sink() {
        let config = GestureConfig {
            lock_hold_frames: 3,
            ..Default::default()
        };
        let frames = (0..3u64)
            .map(|n| {
                Ok(DetectionResult::new(
                    n * 33,
                    vec![
                        hand(Handedness::Left, Pose::Fist, 0.3),
                        hand(Handedness::Right, Pose::Fist, 0.7),
                    ],
                ))
            })
            .collect();
        let (mut session, mut rx) = session(frames, config, 0, Pacing::Live);

        session.run(std::future::pending()).await;
        assert!(session.classifier().is_locked());
        assert_eq!(drain(&mut rx), vec![GestureEvent::LockToggle { is_locked: true }]);
    }
}
