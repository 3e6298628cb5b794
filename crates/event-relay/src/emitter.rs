//! Fire-and-forget event emission

use std::collections::HashMap;

use gesture::{FrameAnalysis, GestureEvent, Pose};
use hand_landmarks::Handedness;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::message::{ControlMessage, RoomCode};
use crate::sink::EventSink;

/// Running emission counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    /// Messages accepted by the sink
    pub sent: u64,
    /// Messages the sink rejected (dropped, not retried)
    pub failed: u64,
    /// Continuous updates skipped by the rate limit
    pub throttled: u64,
    /// Release signals identical to the last payload sent
    pub deduplicated: u64,
}

/// Addresses events to a room and pushes them through a sink
///
/// Edge events (swipe, release, lock toggle, ...) always go out, except an
/// `open` whose payload equals the last one sent. Continuous updates
/// (`fist_move`, `pinch_hold`) can be rate limited per hand so a subscriber
/// is not flooded at the camera frame rate. A rate-limited `fist_move` is not
/// lost: its delta is carried into the next drag update for that hand, and
/// whatever is still owed goes out when the fist opens or leaves the frame.
pub struct EventEmitter<K> {
    sink: K,
    room: RoomCode,
    /// Minimum spacing between continuous updates of one kind and hand (ms, 0 = off)
    continuous_interval_ms: u64,
    last_continuous: HashMap<(&'static str, Option<&'static str>), u64>,
    /// Drag distance held back by the rate limit, per hand
    pending_drag: HashMap<Handedness, f32>,
    /// Serialized form of the last event the sink accepted
    last_payload: Option<String>,
    stats: EmitStats,
}

impl<K: EventSink> EventEmitter<K> {
    pub fn new(sink: K, room: RoomCode) -> Self {
        info!("Relaying gestures to room {}", room);
        Self {
            sink,
            room,
            continuous_interval_ms: 0,
            last_continuous: HashMap::new(),
            pending_drag: HashMap::new(),
            last_payload: None,
            stats: EmitStats::default(),
        }
    }

    /// Rate-limit continuous updates
    pub fn with_continuous_interval(mut self, interval_ms: u64) -> Self {
        self.continuous_interval_ms = interval_ms;
        self
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Give the sink back (e.g. to close a broker connection)
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Drag distance not yet relayed for `hand`
    pub fn pending_drag(&self, hand: Handedness) -> f32 {
        self.pending_drag.get(&hand).copied().unwrap_or(0.0)
    }

    /// Send every event of a frame; returns how many the sink accepted
    pub async fn emit(&mut self, analysis: &FrameAnalysis) -> usize {
        let mut sent = self.flush_ended_drags(analysis).await;
        for event in &analysis.events {
            if self.is_throttled(event, analysis.timestamp_ms) {
                self.stats.throttled += 1;
                counter!("gesture_events_throttled_total", "type" => event.kind()).increment(1);
                if let GestureEvent::FistMove { hand, delta_x } = event {
                    *self.pending_drag.entry(*hand).or_insert(0.0) += delta_x;
                }
                continue;
            }
            if self.is_repeated_release(event) {
                self.stats.deduplicated += 1;
                counter!("gesture_events_deduplicated_total").increment(1);
                debug!("Suppressing repeated {} for room {}", event.kind(), self.room);
                continue;
            }
            let outgoing = match event {
                GestureEvent::FistMove { hand, delta_x } => GestureEvent::FistMove {
                    hand: *hand,
                    delta_x: delta_x + self.pending_drag.remove(hand).unwrap_or(0.0),
                },
                other => other.clone(),
            };
            if self.send(outgoing).await {
                sent += 1;
            }
        }
        sent
    }

    /// Send a single event; failures are logged and counted, never retried
    pub async fn send(&mut self, event: GestureEvent) -> bool {
        let kind = event.kind();
        let payload = serde_json::to_string(&event).ok();
        let message = ControlMessage::new(self.room.clone(), event);

        match self.sink.send(&message).await {
            Ok(()) => {
                debug!("Emitted {} to room {}", kind, self.room);
                self.last_payload = payload;
                self.stats.sent += 1;
                counter!("gesture_events_emitted_total", "type" => kind).increment(1);
                true
            }
            Err(e) => {
                warn!("Dropping {} event for room {}: {}", kind, self.room, e);
                self.stats.failed += 1;
                counter!("gesture_sink_failures_total").increment(1);
                false
            }
        }
    }

    /// Relay the owed distance of every drag that ended this frame.
    /// A lock toggle stays alone in its frame; the flush waits a frame.
    async fn flush_ended_drags(&mut self, analysis: &FrameAnalysis) -> usize {
        if analysis
            .events
            .iter()
            .any(|e| matches!(e, GestureEvent::LockToggle { .. }))
        {
            return 0;
        }

        let ended: Vec<Handedness> = self
            .pending_drag
            .keys()
            .copied()
            .filter(|hand| {
                analysis.is_locked
                    || !analysis
                        .poses
                        .iter()
                        .any(|p| p.hand == *hand && p.pose == Pose::Fist)
            })
            .collect();

        let mut sent = 0;
        for hand in ended {
            let Some(delta_x) = self.pending_drag.remove(&hand) else {
                continue;
            };
            debug!("Flushing {:.3} of held-back drag for {} hand", delta_x, hand);
            if self.send(GestureEvent::FistMove { hand, delta_x }).await {
                sent += 1;
            }
        }
        sent
    }

    fn is_repeated_release(&self, event: &GestureEvent) -> bool {
        if !matches!(event, GestureEvent::Open) {
            return false;
        }
        match (&self.last_payload, serde_json::to_string(event)) {
            (Some(last), Ok(payload)) => *last == payload,
            _ => false,
        }
    }

    fn is_throttled(&mut self, event: &GestureEvent, timestamp_ms: u64) -> bool {
        if self.continuous_interval_ms == 0 || !event.is_continuous() {
            return false;
        }

        let key = (event.kind(), event.hand().map(|h| h.as_str()));
        match self.last_continuous.get(&key) {
            Some(&last) if timestamp_ms.saturating_sub(last) < self.continuous_interval_ms => true,
            _ => {
                self.last_continuous.insert(key, timestamp_ms);
                false
            }
        }
    }
}
