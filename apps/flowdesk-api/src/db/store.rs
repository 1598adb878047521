//! Storage contracts for conversations, messages and notifications.
//!
//! Backed by Postgres in production and an in-memory map in development and
//! tests. Every method may suspend; callers must not hold registry locks
//! across them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChatError;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, NewMessage};
use crate::models::notification::{NewNotification, Notification};

/// Default and maximum number of entries returned by bounded reads.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("write conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the public conversation, creating it on first use.
    async fn get_or_create_public(&self) -> Result<Conversation, StoreError>;

    /// Return the private conversation for the unordered pair `{a, b}`,
    /// creating it if none exists. The flag is `true` when it was created by
    /// this call. Callers reject `a == b` before reaching the store.
    async fn get_or_create_private(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(Conversation, bool), StoreError>;

    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Raise `last_message_at` to `at`. Never moves it backwards.
    async fn touch_last_message_at(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Every conversation `user_id` participates in plus the public one,
    /// most recently active first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError>;
}

#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Durably record a message. Content must already be trimmed and non-empty.
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// The newest `limit` messages (capped at [`HISTORY_LIMIT`]), oldest first.
    async fn recent_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError>;

    /// The newest `limit` notifications (capped at [`HISTORY_LIMIT`]) owned by `user_id`.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Mark every unread notification owned by `user_id` as read. Returns the
    /// number of rows changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Mark one notification read if `user_id` owns it. Already-read rows
    /// still count as found.
    async fn mark_read(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError>;

    /// Delete `notification_id` if `user_id` owns it. Returns whether a row
    /// was deleted; a foreign or missing id both yield `false`.
    async fn delete_one(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError>;
}

/// Get or create the private conversation between two distinct users.
/// Chatting with yourself is rejected before the store is touched.
pub async fn open_private_conversation(
    store: &dyn ConversationStore,
    user_id: &str,
    other_user_id: &str,
) -> Result<(Conversation, bool), ChatError> {
    if user_id == other_user_id {
        return Err(ChatError::invalid("Cannot start a chat with yourself"));
    }
    Ok(store.get_or_create_private(user_id, other_user_id).await?)
}

pub(crate) fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, HISTORY_LIMIT)
}
