use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sender id stamped on messages the server originates.
pub const SERVER_ID: &str = "server";

/// Message types the server knows about. Anything else is relayed untouched.
pub mod kind {
    pub const JOIN: &str = "join";
    pub const LEAVE: &str = "leave";
    pub const USER_JOINED: &str = "user_joined";
    pub const USER_LEFT: &str = "user_left";
    pub const ROOM_INFO: &str = "room_info";
    pub const ROOM_CREATED: &str = "room_created";
    pub const ROOM_FULL: &str = "room_full";
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice_candidate";
    pub const ERROR: &str = "error";
}

/// A signaling message as it travels on the wire, in both directions.
///
/// `data` is opaque to the relay. `from` is never trusted from the wire: the
/// read pump overwrites it with the authenticated participant id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub from: String,
    /// Empty means broadcast to the rest of the room.
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub data: Value,
}

impl SignalingMessage {
    pub fn new(kind: &str, from: &str, to: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            data,
        }
    }

    pub fn decode(frame: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(frame)
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of strings and a `Value` cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_empty()
    }

    pub fn user_joined(participant_id: &str, room_id: &str) -> Self {
        Self::new(
            kind::USER_JOINED,
            participant_id,
            "",
            json!({ "room_id": room_id }),
        )
    }

    pub fn user_left(participant_id: &str, room_id: &str) -> Self {
        Self::new(
            kind::USER_LEFT,
            participant_id,
            "",
            json!({ "room_id": room_id }),
        )
    }

    /// Snapshot of the other members, sent to a newly admitted participant.
    pub fn room_info(to: &str, members: &[String]) -> Self {
        Self::new(kind::ROOM_INFO, SERVER_ID, to, json!(members))
    }

    pub fn room_created(to: &str, room_id: &str) -> Self {
        Self::new(
            kind::ROOM_CREATED,
            SERVER_ID,
            to,
            json!({ "room_id": room_id }),
        )
    }

    pub fn room_full(to: &str, message: &str) -> Self {
        Self::new(kind::ROOM_FULL, SERVER_ID, to, json!({ "message": message }))
    }

    pub fn error(to: &str, message: &str) -> Self {
        Self::new(kind::ERROR, SERVER_ID, to, json!({ "message": message }))
    }
}
