//! Broadcast hub for addressing rooms.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters payloads locally against its room membership in the
//! [`PresenceRegistry`]. Single-process only.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use super::presence::PresenceRegistry;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// A payload addressed to every connection joined to `room_id`.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    /// Target room: a conversation id, `"general"`, or a user id (personal room).
    pub room_id: String,
    /// The dispatch event name (e.g. "chat:receive_private").
    pub event_name: String,
    pub data: Value,
    /// Connections belonging to this user are skipped (no self-echo).
    pub except_user: Option<String>,
}

impl BroadcastPayload {
    /// Whether the connection `connection_id` owned by `user_id` should
    /// receive this payload.
    pub fn is_visible_to(
        &self,
        presence: &PresenceRegistry,
        connection_id: &str,
        user_id: &str,
    ) -> bool {
        if self.except_user.as_deref() == Some(user_id) {
            return false;
        }
        presence.is_in_room(connection_id, &self.room_id)
    }
}

/// The room broadcast capability. Cloneable; held by the delivery engine and
/// by any collaborator that pushes to personal rooms.
#[derive(Clone)]
pub struct GatewayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl GatewayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each gateway session should call
    /// this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Emit to every connection in `room_id`.
    pub fn to_room(&self, room_id: &str, event_name: &str, data: Value) {
        self.dispatch(BroadcastPayload {
            room_id: room_id.to_string(),
            event_name: event_name.to_string(),
            data,
            except_user: None,
        });
    }

    /// Emit to every connection in `room_id` except those of `except_user`.
    pub fn to_room_except(&self, room_id: &str, except_user: &str, event_name: &str, data: Value) {
        self.dispatch(BroadcastPayload {
            room_id: room_id.to_string(),
            event_name: event_name.to_string(),
            data,
            except_user: Some(except_user.to_string()),
        });
    }

    fn dispatch(&self, payload: BroadcastPayload) {
        // Err only means nobody is subscribed.
        let _ = self.sender.send(Arc::new(payload));
    }
}

impl Default for GatewayBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payload_visibility_follows_room_membership() {
        let presence = PresenceRegistry::new();
        presence.enroll("conn_a", "usr_a");
        presence.enroll("conn_b", "usr_b");
        presence.join_room("conn_b", "conv_x");

        let hub = GatewayBroadcast::new();
        let mut rx = hub.subscribe();
        hub.to_room("conv_x", "chat:receive_private", serde_json::json!({}));

        let payload = rx.recv().await.unwrap();
        assert!(payload.is_visible_to(&presence, "conn_b", "usr_b"));
        assert!(!payload.is_visible_to(&presence, "conn_a", "usr_a"));
    }

    #[tokio::test]
    async fn excluded_user_never_sees_payload() {
        let presence = PresenceRegistry::new();
        presence.enroll("conn_a1", "usr_a");
        presence.enroll("conn_a2", "usr_a");
        presence.enroll("conn_b", "usr_b");

        let hub = GatewayBroadcast::new();
        let mut rx = hub.subscribe();
        hub.to_room_except("general", "usr_a", "chat:user_typing_general", serde_json::json!({}));

        let payload = rx.recv().await.unwrap();
        assert!(!payload.is_visible_to(&presence, "conn_a1", "usr_a"));
        assert!(!payload.is_visible_to(&presence, "conn_a2", "usr_a"));
        assert!(payload.is_visible_to(&presence, "conn_b", "usr_b"));
    }

    #[test]
    fn dispatch_without_subscribers_is_a_no_op() {
        let hub = GatewayBroadcast::new();
        hub.to_room("general", "chat:receive_general", serde_json::json!({}));
    }
}
