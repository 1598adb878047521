//! Conversation endpoints: start a private chat, list chats, load history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::store::{self, HISTORY_LIMIT};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/{conversation_id}/messages", get(list_messages))
}

// ---------------------------------------------------------------------------
// POST /api/v1/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    #[serde(default, alias = "receiverId")]
    pub receiver_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Conversations",
    security(("bearer" = [])),
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Private conversation created", body = Conversation),
        (status = 200, description = "Existing private conversation", body = Conversation),
        (status = 400, description = "Missing receiver or self-chat", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn create_conversation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let receiver_id = body
        .receiver_id
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            ApiError::validation(vec![FieldError {
                field: "receiver_id".to_string(),
                message: "receiver_id is required".to_string(),
            }])
        })?;

    let (conversation, created) =
        store::open_private_conversation(state.conversations.as_ref(), &user.id, &receiver_id)
            .await?;

    if created {
        tracing::info!(
            conversation_id = %conversation.id,
            user_id = %user.id,
            receiver_id = %receiver_id,
            "private conversation created"
        );
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Conversations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversations, most recently active first", body = Vec<Conversation>),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_conversations(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conversations = state.conversations.list_for_user(&user.id).await?;
    Ok(Json(conversations))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations/:conversation_id/messages
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversation_id}/messages",
    tag = "Conversations",
    security(("bearer" = [])),
    params(
        ("conversation_id" = String, Path, description = "Conversation ID"),
    ),
    responses(
        (status = 200, description = "Most recent messages, oldest first", body = Vec<Message>),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Conversation not found", body = ApiErrorBody),
    ),
)]
pub async fn list_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let conversation = state
        .conversations
        .find(&conversation_id)
        .await?
        .filter(|c| c.is_visible_to(&user.id))
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    let messages = state
        .messages
        .recent_history(&conversation.id, HISTORY_LIMIT)
        .await?;
    Ok(Json(messages))
}
