//! Ephemeral "is typing" relay. Nothing here is persisted or retried.

use super::events::EventName;
use super::fanout::GatewayBroadcast;
use crate::models::user::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingScope {
    General,
    Private,
}

fn event_name(scope: TypingScope, signal: TypingSignal) -> &'static str {
    match (scope, signal) {
        (TypingScope::General, TypingSignal::Start) => EventName::USER_TYPING_GENERAL,
        (TypingScope::General, TypingSignal::Stop) => EventName::USER_STOPPED_TYPING_GENERAL,
        (TypingScope::Private, TypingSignal::Start) => EventName::USER_TYPING_PRIVATE,
        (TypingScope::Private, TypingSignal::Stop) => EventName::USER_STOPPED_TYPING_PRIVATE,
    }
}

/// Relay a typing signal to everyone in `room_id` except the sender's own
/// connections.
pub fn relay(
    broadcast: &GatewayBroadcast,
    sender: &Principal,
    room_id: &str,
    scope: TypingScope,
    signal: TypingSignal,
) {
    let data = serde_json::json!({ "name": sender.name });
    broadcast.to_room_except(room_id, &sender.id, event_name(scope, signal), data);
}
