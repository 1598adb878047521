pub mod conversations;
pub mod health;
pub mod notifications;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            conversations::router().merge(notifications::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        // Conversations
        conversations::create_conversation,
        conversations::list_conversations,
        conversations::list_messages,
        // Notifications
        notifications::list_notifications,
        notifications::mark_all_read,
        notifications::mark_read,
        notifications::delete_notification,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::conversation::Conversation,
            crate::models::conversation::ConversationKind,
            crate::models::message::Message,
            crate::models::notification::Notification,
            crate::models::notification::NotificationKind,
            // Route request/response types
            health::HealthResponse,
            conversations::CreateConversationRequest,
            notifications::MarkAllReadResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Conversations", description = "Public and private chats"),
        (name = "Notifications", description = "Per-user notification inbox"),
    )
)]
pub struct ApiDoc;
