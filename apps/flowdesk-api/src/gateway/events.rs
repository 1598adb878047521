//! Gateway opcodes, event names, and wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Named event. Server → client carries `t` and `s`; client → server carries `t`.
pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_HEARTBEAT_ACK: u8 = 6;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    pub d: Value,
}

impl GatewayMessage {
    /// Build a DISPATCH message (op=0).
    pub fn dispatch(event_name: &str, seq: u64, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event_name.to_string()),
            s: Some(seq),
            d: data,
        }
    }

    /// Build a HEARTBEAT_ACK message (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            s: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// Client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendGeneralPayload {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendPrivatePayload {
    #[serde(default, alias = "roomId")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomPayload {
    #[serde(default, alias = "roomId")]
    pub room_id: Option<String>,
}

impl RoomPayload {
    /// Accepts either `{ "room_id": "..." }` or a bare room id string.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(room_id) => Self {
                room_id: Some(room_id),
            },
            other => serde_json::from_value(other).unwrap_or_default(),
        }
    }

    pub fn into_room_id(self) -> Option<String> {
        self.room_id.filter(|r| !r.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Events sent by clients (`t` of an op=0 client message).
pub struct ClientEvent;

impl ClientEvent {
    pub const GET_GENERAL_HISTORY: &'static str = "chat:get_general_history";
    pub const SEND_GENERAL: &'static str = "chat:send_general";
    pub const START_TYPING_GENERAL: &'static str = "chat:start_typing_general";
    pub const STOP_TYPING_GENERAL: &'static str = "chat:stop_typing_general";
    pub const JOIN_ROOM: &'static str = "join_room";
    pub const SEND_PRIVATE: &'static str = "chat:send_private";
    pub const START_TYPING_PRIVATE: &'static str = "chat:start_typing_private";
    pub const STOP_TYPING_PRIVATE: &'static str = "chat:stop_typing_private";
}

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const READY: &'static str = "READY";
    pub const ERROR: &'static str = "error";
    pub const GENERAL_HISTORY: &'static str = "chat:general_history";
    pub const RECEIVE_GENERAL: &'static str = "chat:receive_general";
    pub const USER_TYPING_GENERAL: &'static str = "chat:user_typing_general";
    pub const USER_STOPPED_TYPING_GENERAL: &'static str = "chat:user_stopped_typing_general";
    pub const RECEIVE_PRIVATE: &'static str = "chat:receive_private";
    pub const USER_TYPING_PRIVATE: &'static str = "chat:user_typing_private";
    pub const USER_STOPPED_TYPING_PRIVATE: &'static str = "chat:user_stopped_typing_private";
    pub const NEW_MESSAGE_NOTIFICATION: &'static str = "chat:new_message_notification";
    pub const PROCESS_ASSIGNED: &'static str = "process:assigned";
    pub const INCIDENT_CREATED: &'static str = "incident:created";
    pub const PROCESS_STATUS_UPDATED: &'static str = "process:status_updated";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_payload_accepts_bare_string_and_camel_case() {
        let bare = RoomPayload::from_value(serde_json::json!("conv_1"));
        assert_eq!(bare.into_room_id().as_deref(), Some("conv_1"));

        let camel = RoomPayload::from_value(serde_json::json!({ "roomId": "conv_2" }));
        assert_eq!(camel.into_room_id().as_deref(), Some("conv_2"));

        let missing = RoomPayload::from_value(serde_json::json!({}));
        assert!(missing.into_room_id().is_none());
    }

    #[test]
    fn dispatch_serializes_event_and_sequence() {
        let msg = GatewayMessage::dispatch(EventName::READY, 1, serde_json::json!({}));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["op"], 0);
        assert_eq!(json["t"], "READY");
        assert_eq!(json["s"], 1);
    }
}
