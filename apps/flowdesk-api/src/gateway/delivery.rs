//! Message delivery: persist, broadcast, then decide live vs stored
//! notification for every private recipient.
//!
//! A message moves through
//! `Composed → Persisted → Broadcast → (private only) NotificationEvaluated`
//! and ends, per recipient, in exactly one of [`DeliveryOutcome::Live`] or
//! [`DeliveryOutcome::Stored`]. Presence is evaluated once per recipient per
//! message.

use std::sync::Arc;

use serde::Serialize;

use crate::db::store::{ConversationStore, MessageLog, NotificationStore, HISTORY_LIMIT};
use crate::error::ChatError;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, NewMessage};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::models::user::Principal;

use super::events::EventName;
use super::fanout::GatewayBroadcast;
use super::presence::PresenceRegistry;

/// Characters of message content quoted in a chat notification.
const PREVIEW_CHARS: usize = 30;

/// How a single recipient of a private message was reached.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// The recipient had the conversation open on at least one device.
    Live,
    /// The recipient was absent; a notification was persisted and pushed to
    /// their personal room.
    Stored(Notification),
    /// The recipient was absent and the notification could not be persisted.
    NotificationFailed,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    /// One entry per recipient (participants other than the sender). Empty
    /// for the public conversation.
    pub recipients: Vec<(String, DeliveryOutcome)>,
}

/// Everything needed to persist and fan out chat traffic. Built once at
/// startup and shared through `AppState`.
pub struct DeliveryEngine {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageLog>,
    notifications: Arc<dyn NotificationStore>,
    presence: Arc<PresenceRegistry>,
    broadcast: GatewayBroadcast,
}

impl DeliveryEngine {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageLog>,
        notifications: Arc<dyn NotificationStore>,
        presence: Arc<PresenceRegistry>,
        broadcast: GatewayBroadcast,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            presence,
            broadcast,
        }
    }

    /// The newest messages of the public conversation, oldest first.
    pub async fn general_history(&self) -> Result<Vec<Message>, ChatError> {
        let conv = self.conversations.get_or_create_public().await?;
        Ok(self.messages.recent_history(&conv.id, HISTORY_LIMIT).await?)
    }

    /// Post to the public conversation. Blank content is a no-op (`Ok(None)`).
    pub async fn send_general(
        &self,
        sender: &Principal,
        content: &str,
    ) -> Result<Option<Delivery>, ChatError> {
        let Some(content) = normalize_content(content) else {
            return Ok(None);
        };
        let conv = self.conversations.get_or_create_public().await?;
        self.deliver(&conv, sender, content).await.map(Some)
    }

    /// Post to a private conversation the sender participates in.
    ///
    /// Blank content is a no-op. A conversation that does not exist, is
    /// public, or does not include the sender yields [`ChatError::NotFound`].
    pub async fn send_private(
        &self,
        sender: &Principal,
        conversation_id: &str,
        content: &str,
    ) -> Result<Option<Delivery>, ChatError> {
        let Some(content) = normalize_content(content) else {
            return Ok(None);
        };
        let conv = self
            .conversations
            .find(conversation_id)
            .await?
            .filter(|c| !c.is_public() && c.has_participant(&sender.id))
            .ok_or(ChatError::NotFound)?;
        self.deliver(&conv, sender, content).await.map(Some)
    }

    /// Persist a notification produced outside the chat flow (process
    /// assignment, incident report, status change) and push it to the
    /// recipient's personal room under `event_name`.
    pub async fn notify(
        &self,
        notification: NewNotification,
        event_name: &str,
    ) -> Result<Notification, ChatError> {
        let stored = self.notifications.create(notification).await?;
        self.push_notification(&stored, event_name);
        Ok(stored)
    }

    async fn deliver(
        &self,
        conv: &Conversation,
        sender: &Principal,
        content: &str,
    ) -> Result<Delivery, ChatError> {
        // 1. Durability precedes visibility.
        let message = self
            .messages
            .append(NewMessage {
                conversation_id: conv.id.clone(),
                sender_id: sender.id.clone(),
                sender_name: sender.name.clone(),
                content: content.to_string(),
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    conversation_id = %conv.id,
                    sender_id = %sender.id,
                    "message append failed; fan-out aborted"
                );
                ChatError::Persistence(e)
            })?;

        // 2. The recency marker only orders conversation lists; the message
        //    is already durable, so a failure here does not stop delivery.
        if let Err(e) = self
            .conversations
            .touch_last_message_at(&conv.id, message.created_at)
            .await
        {
            tracing::warn!(error = %e, conversation_id = %conv.id, "last_message_at update failed");
        }

        // 3. Everyone in the room, sender included.
        let event = if conv.is_public() {
            EventName::RECEIVE_GENERAL
        } else {
            EventName::RECEIVE_PRIVATE
        };
        self.broadcast
            .to_room(conv.room_id(), event, to_value(&message));

        // 4. Private only: live vs stored, once per recipient.
        let mut recipients = Vec::new();
        if !conv.is_public() {
            for participant in conv.participant_ids.iter().filter(|p| **p != sender.id) {
                let outcome = self.evaluate_recipient(conv, participant, &message).await;
                recipients.push((participant.clone(), outcome));
            }
        }

        Ok(Delivery {
            message,
            recipients,
        })
    }

    async fn evaluate_recipient(
        &self,
        conv: &Conversation,
        recipient_id: &str,
        message: &Message,
    ) -> DeliveryOutcome {
        if self.presence.is_user_present_in_room(recipient_id, &conv.id) {
            return DeliveryOutcome::Live;
        }

        let notification = NewNotification {
            user_id: recipient_id.to_string(),
            message: chat_preview(&message.sender_name, &message.content),
            link: Some(format!("/chat/{}", conv.id)),
            kind: NotificationKind::Chat,
        };

        match self.notifications.create(notification).await {
            Ok(stored) => {
                self.push_notification(&stored, EventName::NEW_MESSAGE_NOTIFICATION);
                DeliveryOutcome::Stored(stored)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    conversation_id = %conv.id,
                    user_id = %recipient_id,
                    "chat notification could not be stored"
                );
                DeliveryOutcome::NotificationFailed
            }
        }
    }

    fn push_notification(&self, notification: &Notification, event_name: &str) {
        tracing::debug!(
            notification_id = notification.id,
            user_id = %notification.user_id,
            event = event_name,
            "notification pushed"
        );
        self.broadcast.to_room(
            &notification.user_id,
            event_name,
            to_value(notification),
        );
    }
}

fn to_value<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Trimmed content, or `None` when nothing but whitespace was sent.
fn normalize_content(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Notification text for a chat message: sender name plus the first
/// [`PREVIEW_CHARS`] characters of content.
pub fn chat_preview(sender_name: &str, content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("New message from {sender_name}: \"{head}{ellipsis}\"")
}
