//! Room codes and the relayed message envelope

use std::fmt;

use chrono::{DateTime, Utc};
use gesture::GestureEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RelayError;

/// Smallest generated room code
const ROOM_CODE_MIN: u128 = 10_000;
/// Number of distinct generated codes (10000..=99999)
const ROOM_CODE_SPAN: u128 = 90_000;

/// Identifier shared by the gesture sender and its subscribers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate a room code supplied by configuration or a peer
    pub fn new(code: impl Into<String>) -> Result<Self, RelayError> {
        let code = code.into();
        validate_room_code(&code)?;
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MQTT topic peers subscribe to
    pub fn control_topic(&self) -> String {
        format!("rooms/{}/control-object", self.0)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RelayError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Room codes become a topic level, so they must not contain separators or wildcards
pub fn validate_room_code(code: &str) -> Result<(), RelayError> {
    if code.is_empty() {
        return Err(RelayError::InvalidRoom("room code is empty".to_string()));
    }
    if code.len() > 64 {
        return Err(RelayError::InvalidRoom(format!(
            "room code is {} characters long (max 64)",
            code.len()
        )));
    }
    if let Some(c) = code
        .chars()
        .find(|c| matches!(c, '/' | '+' | '#') || c.is_whitespace() || c.is_control())
    {
        return Err(RelayError::InvalidRoom(format!(
            "room code '{}' contains forbidden character {:?}",
            code, c
        )));
    }
    Ok(())
}

/// Fresh 5-digit room code (10000-99999)
pub fn generate_room_code() -> RoomCode {
    let value = ROOM_CODE_MIN + Uuid::new_v4().as_u128() % ROOM_CODE_SPAN;
    RoomCode(value.to_string())
}

/// One relayed gesture, as delivered on the room's `control-object` channel
///
/// The event's own fields (`type`, `hand`, ...) sit at the top level next to
/// the room and send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub room: RoomCode,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: GestureEvent,
}

impl ControlMessage {
    pub fn new(room: RoomCode, event: GestureEvent) -> Self {
        Self {
            room,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}
