//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::auth::tokens;
use crate::error::{ApiError, ChatError};
use crate::models::user::Principal;
use crate::AppState;

use super::events::{
    ClientMessage, EventName, GatewayMessage, HeartbeatPayload, OP_DISPATCH, OP_HEARTBEAT,
};
use super::fanout::BroadcastPayload;
use super::handler::{self, HEARTBEAT_INTERVAL_MS};
use super::session::GatewaySession;

/// Close code sent when the client misses its heartbeat window.
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

/// Authenticate before upgrading: a bad credential never reaches the
/// event loop.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GatewayQuery>,
) -> Response {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(tokens::bearer_token)
        .map(str::to_string);

    let Some(token) = header_token.or(query.token) else {
        return ApiError::unauthorized("Missing credential").into_response();
    };

    let user = match tokens::verify_token(&state.config.jwt_secret, &token) {
        Ok(user) => user,
        Err(err) => return ApiError::from(err).into_response(),
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, user))
}

async fn handle_connection(socket: WebSocket, state: AppState, user: Principal) {
    let (mut ws_tx, ws_rx) = socket.split();

    let session = Arc::new(GatewaySession::new(user));
    // Subscribe before enrolling so nothing addressed to the new connection
    // slips between the two.
    let broadcast_rx = state.broadcast.subscribe();
    state
        .presence
        .enroll(&session.connection_id, session.user_id());

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id(),
        connections = state.presence.connection_count(session.user_id()),
        "gateway connection established"
    );

    if send_json(&mut ws_tx, &handler::ready(&session)).await.is_ok() {
        run_session(&state, session.clone(), ws_tx, ws_rx, broadcast_rx).await;
    }

    let rooms = state
        .presence
        .remove_connection(&session.connection_id)
        .map(|departed| departed.rooms.len())
        .unwrap_or(0);

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id(),
        rooms,
        "gateway connection ended"
    );
}

/// Main session event loop: read client messages, forward broadcasts, enforce heartbeat.
async fn run_session(
    state: &AppState,
    session: Arc<GatewaySession>,
    mut ws_tx: WsSink,
    mut ws_rx: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<Arc<BroadcastPayload>>,
) {
    // Heartbeat deadline: client must heartbeat within 1.5× the interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(_) => {
                                let err = ChatError::invalid("Invalid JSON");
                                if send_error(&mut ws_tx, &session, &err).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        match client_msg.op {
                            OP_HEARTBEAT => {
                                got_heartbeat = true;
                                let payload: HeartbeatPayload =
                                    serde_json::from_value(client_msg.d).unwrap_or(HeartbeatPayload { seq: 0 });
                                let ack = GatewayMessage::heartbeat_ack(payload.seq);
                                if send_json(&mut ws_tx, &ack).await.is_err() {
                                    break;
                                }
                            }
                            OP_DISPATCH => {
                                let Some(event) = client_msg.t else {
                                    tracing::debug!(connection_id = %session.connection_id, "dispatch without event name");
                                    continue;
                                };
                                if dispatch_event(state, &session, &mut ws_tx, &event, client_msg.d).await.is_err() {
                                    break;
                                }
                            }
                            op => {
                                let err = ChatError::invalid(format!("Unknown opcode: {op}"));
                                if send_error(&mut ws_tx, &session, &err).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Broadcast event from the fanout hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        if !payload.is_visible_to(&state.presence, &session.connection_id, session.user_id()) {
                            continue;
                        }

                        let msg = GatewayMessage::dispatch(&payload.event_name, session.next_seq(), payload.data.clone());
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped = n,
                            "gateway connection lagged behind broadcast"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Run one client event and deliver its reply or error to this connection.
/// Only a failed socket write is returned as an error.
async fn dispatch_event(
    state: &AppState,
    session: &GatewaySession,
    ws_tx: &mut WsSink,
    event: &str,
    data: serde_json::Value,
) -> Result<(), axum::Error> {
    match handler::handle_event(state, session, event, data).await {
        Ok(Some(reply)) => {
            let msg = GatewayMessage::dispatch(reply.event_name, session.next_seq(), reply.data);
            send_json(ws_tx, &msg).await
        }
        Ok(None) => Ok(()),
        Err(err) if handler::is_silent(&err) => {
            tracing::debug!(
                connection_id = %session.connection_id,
                user_id = %session.user_id(),
                event,
                error = %err,
                "client event dropped"
            );
            Ok(())
        }
        Err(err) => {
            tracing::warn!(
                connection_id = %session.connection_id,
                user_id = %session.user_id(),
                event,
                error = %err,
                "client event failed"
            );
            send_error(ws_tx, session, &err).await
        }
    }
}

async fn send_error(
    ws_tx: &mut WsSink,
    session: &GatewaySession,
    err: &ChatError,
) -> Result<(), axum::Error> {
    let (code, message) = err.to_error_code();
    let msg = GatewayMessage::dispatch(
        EventName::ERROR,
        session.next_seq(),
        serde_json::json!({ "code": code, "message": message }),
    );
    send_json(ws_tx, &msg).await
}

async fn send_json(ws_tx: &mut WsSink, msg: &GatewayMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
