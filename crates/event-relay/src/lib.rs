//! Gesture Event Relay
//!
//! Delivers classified gesture events to everyone else in a room:
//! - Room codes and the `control-object` message envelope
//! - MQTT, in-process broadcast, and JSON-lines sinks
//! - Fire-and-forget emitter with continuous-event throttling

mod emitter;
mod message;
mod sink;

pub use emitter::{EmitStats, EventEmitter};
pub use message::{generate_room_code, validate_room_code, ControlMessage, RoomCode};
pub use sink::{ChannelSink, EventSink, MqttConfig, MqttSink, WriterSink};

use thiserror::Error;

/// Relay error types
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid room code: {0}")]
    InvalidRoom(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io(err.to_string())
    }
}
