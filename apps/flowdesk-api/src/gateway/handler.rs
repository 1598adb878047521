//! Client event dispatch for an established gateway connection.

use serde_json::Value;

use crate::error::ChatError;
use crate::models::conversation::PUBLIC_ROOM;
use crate::AppState;

use super::events::{
    ClientEvent, EventName, GatewayMessage, RoomPayload, SendGeneralPayload, SendPrivatePayload,
};
use super::session::GatewaySession;
use super::typing::{self, TypingScope, TypingSignal};

/// Heartbeat interval sent to clients in the READY payload (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// A dispatch addressed to the acting connection only.
#[derive(Debug)]
pub struct Reply {
    pub event_name: &'static str,
    pub data: Value,
}

/// Build the READY dispatch for a freshly enrolled connection.
pub fn ready(session: &GatewaySession) -> GatewayMessage {
    let data = serde_json::json!({
        "connection_id": session.connection_id,
        "user": session.user,
        "heartbeat_interval": HEARTBEAT_INTERVAL_MS,
    });
    GatewayMessage::dispatch(EventName::READY, session.next_seq(), data)
}

/// Whether a handler failure is dropped without telling the client.
///
/// Malformed chat traffic and references to rooms the user cannot see are
/// ignored; only persistence failures are reported back.
pub fn is_silent(err: &ChatError) -> bool {
    matches!(err, ChatError::InvalidRequest(_) | ChatError::NotFound)
}

/// Handle one named client event (`op=0`).
pub async fn handle_event(
    state: &AppState,
    session: &GatewaySession,
    event: &str,
    data: Value,
) -> Result<Option<Reply>, ChatError> {
    match event {
        ClientEvent::GET_GENERAL_HISTORY => {
            let history = state.delivery.general_history().await?;
            Ok(Some(Reply {
                event_name: EventName::GENERAL_HISTORY,
                data: serde_json::to_value(&history).unwrap_or_default(),
            }))
        }

        ClientEvent::SEND_GENERAL => {
            let payload: SendGeneralPayload = serde_json::from_value(data).unwrap_or_default();
            let content = payload
                .content
                .ok_or_else(|| ChatError::invalid("content is required"))?;
            state.delivery.send_general(&session.user, &content).await?;
            Ok(None)
        }

        ClientEvent::START_TYPING_GENERAL | ClientEvent::STOP_TYPING_GENERAL => {
            typing::relay(
                &state.broadcast,
                &session.user,
                PUBLIC_ROOM,
                TypingScope::General,
                typing_signal(event),
            );
            Ok(None)
        }

        ClientEvent::JOIN_ROOM => {
            let room_id = RoomPayload::from_value(data)
                .into_room_id()
                .ok_or_else(|| ChatError::invalid("roomId is required"))?;
            join_room(state, session, &room_id).await?;
            Ok(None)
        }

        ClientEvent::SEND_PRIVATE => {
            let payload: SendPrivatePayload = serde_json::from_value(data).unwrap_or_default();
            let room_id = payload
                .room_id
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| ChatError::invalid("roomId is required"))?;
            let content = payload
                .content
                .ok_or_else(|| ChatError::invalid("content is required"))?;
            state
                .delivery
                .send_private(&session.user, &room_id, &content)
                .await?;
            Ok(None)
        }

        ClientEvent::START_TYPING_PRIVATE | ClientEvent::STOP_TYPING_PRIVATE => {
            let room_id = RoomPayload::from_value(data)
                .into_room_id()
                .ok_or_else(|| ChatError::invalid("roomId is required"))?;
            if room_id == PUBLIC_ROOM || !state.presence.is_in_room(&session.connection_id, &room_id)
            {
                return Err(ChatError::NotFound);
            }
            typing::relay(
                &state.broadcast,
                &session.user,
                &room_id,
                TypingScope::Private,
                typing_signal(event),
            );
            Ok(None)
        }

        other => Err(ChatError::invalid(format!("unknown event: {other}"))),
    }
}

fn typing_signal(event: &str) -> TypingSignal {
    match event {
        ClientEvent::STOP_TYPING_GENERAL | ClientEvent::STOP_TYPING_PRIVATE => TypingSignal::Stop,
        _ => TypingSignal::Start,
    }
}

/// Join `room_id` if it names a conversation the user may see.
async fn join_room(
    state: &AppState,
    session: &GatewaySession,
    room_id: &str,
) -> Result<(), ChatError> {
    if room_id == PUBLIC_ROOM {
        state.presence.join_room(&session.connection_id, PUBLIC_ROOM);
        return Ok(());
    }

    let conv = state
        .conversations
        .find(room_id)
        .await?
        .filter(|c| c.is_visible_to(session.user_id()))
        .ok_or(ChatError::NotFound)?;

    if state.presence.join_room(&session.connection_id, conv.room_id()) {
        tracing::debug!(
            connection_id = %session.connection_id,
            user_id = %session.user_id(),
            room_id = %conv.room_id(),
            "joined room"
        );
    }
    Ok(())
}
