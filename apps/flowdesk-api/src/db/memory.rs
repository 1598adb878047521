use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use flowdesk_common::id::{prefix, prefixed_ulid};
use flowdesk_common::{snowflake_created_at, SnowflakeGenerator};

use crate::models::conversation::{pair_key, Conversation, ConversationKind};
use crate::models::message::{Message, NewMessage};
use crate::models::notification::{NewNotification, Notification};

use super::store::{clamp_limit, ConversationStore, MessageLog, NotificationStore, StoreError};

// ---------------------------------------------------------------------------
// In-memory implementation (development / tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, Conversation>,
    public_id: Option<String>,
    /// pair key → conversation id
    pairs: HashMap<String, String>,
    /// conversation id → messages in insertion order
    messages: HashMap<String, Vec<Message>>,
    notifications: Vec<Notification>,
}

/// Process-local store. Every check-and-insert runs under a single lock, so
/// neither the public conversation nor a private pair can be duplicated.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    snowflake: Arc<SnowflakeGenerator>,
}

impl MemoryStore {
    pub fn new(snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            snowflake,
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_or_create_public(&self) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(conv) = inner
            .public_id
            .as_ref()
            .and_then(|id| inner.conversations.get(id))
        {
            return Ok(conv.clone());
        }

        let now = Utc::now();
        let conv = Conversation {
            id: prefixed_ulid(prefix::CONVERSATION),
            kind: ConversationKind::Public,
            participant_ids: Vec::new(),
            last_message_at: now,
            created_at: now,
        };
        inner.public_id = Some(conv.id.clone());
        inner.conversations.insert(conv.id.clone(), conv.clone());
        Ok(conv)
    }

    async fn get_or_create_private(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(Conversation, bool), StoreError> {
        let key = pair_key(user_a, user_b);
        let mut inner = self.inner.lock();

        if let Some(conv) = inner
            .pairs
            .get(&key)
            .and_then(|id| inner.conversations.get(id))
        {
            return Ok((conv.clone(), false));
        }

        let now = Utc::now();
        let conv = Conversation {
            id: prefixed_ulid(prefix::CONVERSATION),
            kind: ConversationKind::Private,
            participant_ids: vec![user_a.to_string(), user_b.to_string()],
            last_message_at: now,
            created_at: now,
        };
        inner.pairs.insert(key, conv.id.clone());
        inner.conversations.insert(conv.id.clone(), conv.clone());
        Ok((conv, true))
    }

    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.inner.lock().conversations.get(conversation_id).cloned())
    }

    async fn touch_last_message_at(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(conv) = self.inner.lock().conversations.get_mut(conversation_id) {
            if at > conv.last_message_at {
                conv.last_message_at = at;
            }
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.lock();
        let mut list: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.is_visible_to(user_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(list)
    }
}

#[async_trait]
impl MessageLog for MemoryStore {
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError> {
        // Id is minted under the lock so log order matches id order.
        let mut inner = self.inner.lock();
        let id = self.snowflake.generate();
        let stored = Message {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            content: message.content,
            created_at: snowflake_created_at(id),
        };

        inner
            .messages
            .entry(stored.conversation_id.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn recent_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = clamp_limit(limit);
        let inner = self.inner.lock();
        let Some(log) = inner.messages.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let mut inner = self.inner.lock();
        let id = self.snowflake.generate();
        let stored = Notification {
            id,
            user_id: notification.user_id,
            message: notification.message,
            read: false,
            link: notification.link,
            kind: notification.kind,
            created_at: snowflake_created_at(id),
        };
        inner.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let mut updated = 0;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_read(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.id == notification_id && n.user_id == user_id));
        Ok(inner.notifications.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationKind;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(SnowflakeGenerator::new(0)))
    }

    fn new_message(conversation_id: &str, content: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: "usr_a".to_string(),
            sender_name: "Ana".to_string(),
            content: content.to_string(),
        }
    }

    fn chat_notification(user_id: &str) -> NewNotification {
        NewNotification {
            user_id: user_id.to_string(),
            message: "ping".to_string(),
            link: Some("/chat/conv_x".to_string()),
            kind: NotificationKind::Chat,
        }
    }

    #[tokio::test]
    async fn self_chat_is_rejected_without_creating_anything() {
        let store = store();
        let result = super::super::store::open_private_conversation(&store, "usr_a", "usr_a").await;
        assert!(matches!(result, Err(crate::error::ChatError::InvalidRequest(_))));
        assert_eq!(ConversationStore::list_for_user(&store, "usr_a").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn public_conversation_is_a_singleton() {
        let store = store();
        let first = store.get_or_create_public().await.unwrap();
        let second = store.get_or_create_public().await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.participant_ids.is_empty());
        assert_eq!(first.kind, ConversationKind::Public);
    }

    #[tokio::test]
    async fn private_conversation_is_idempotent_in_either_order() {
        let store = store();
        let (first, created) = store.get_or_create_private("usr_a", "usr_b").await.unwrap();
        assert!(created);
        let (again, created) = store.get_or_create_private("usr_a", "usr_b").await.unwrap();
        assert!(!created);
        let (swapped, created) = store.get_or_create_private("usr_b", "usr_a").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, again.id);
        assert_eq!(first.id, swapped.id);
    }

    #[tokio::test]
    async fn touch_never_moves_backwards() {
        let store = store();
        let (conv, _) = store.get_or_create_private("usr_a", "usr_b").await.unwrap();
        let later = conv.last_message_at + chrono::Duration::seconds(10);
        store.touch_last_message_at(&conv.id, later).await.unwrap();
        store
            .touch_last_message_at(&conv.id, conv.last_message_at)
            .await
            .unwrap();
        let stored = store.find(&conv.id).await.unwrap().unwrap();
        assert_eq!(stored.last_message_at, later);
    }

    #[tokio::test]
    async fn list_for_user_includes_public_and_sorts_by_activity() {
        let store = store();
        let public = store.get_or_create_public().await.unwrap();
        let (ab, _) = store.get_or_create_private("usr_a", "usr_b").await.unwrap();
        let (ac, _) = store.get_or_create_private("usr_a", "usr_c").await.unwrap();
        let (bc, _) = store.get_or_create_private("usr_b", "usr_c").await.unwrap();

        let base = Utc::now() + chrono::Duration::seconds(5);
        store.touch_last_message_at(&ab.id, base).await.unwrap();
        store
            .touch_last_message_at(&public.id, base + chrono::Duration::seconds(1))
            .await
            .unwrap();
        store
            .touch_last_message_at(&ac.id, base + chrono::Duration::seconds(2))
            .await
            .unwrap();

        let ids: Vec<String> = ConversationStore::list_for_user(&store, "usr_a")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![ac.id, public.id, ab.id]);
        assert!(!ids.contains(&bc.id));
    }

    #[tokio::test]
    async fn recent_history_keeps_newest_fifty_oldest_first() {
        let store = store();
        for i in 1..=51 {
            store
                .append(new_message("conv_x", &format!("message {i}")))
                .await
                .unwrap();
        }

        let history = store.recent_history("conv_x", 50).await.unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history.first().unwrap().content, "message 2");
        assert_eq!(history.last().unwrap().content, "message 51");
        assert!(history
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at && w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn recent_history_limit_cannot_exceed_ceiling() {
        let store = store();
        for i in 0..60 {
            store.append(new_message("conv_x", &i.to_string())).await.unwrap();
        }
        assert_eq!(store.recent_history("conv_x", 500).await.unwrap().len(), 50);
        assert!(store.recent_history("conv_empty", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifications_are_listed_newest_first_per_owner() {
        let store = store();
        let first = store.create(chat_notification("usr_b")).await.unwrap();
        store.create(chat_notification("usr_c")).await.unwrap();
        let second = store.create(chat_notification("usr_b")).await.unwrap();

        let list = NotificationStore::list_for_user(&store, "usr_b", 50).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[1].id, first.id);
        assert!(list.iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn mark_all_read_only_touches_owner() {
        let store = store();
        store.create(chat_notification("usr_b")).await.unwrap();
        store.create(chat_notification("usr_b")).await.unwrap();
        store.create(chat_notification("usr_c")).await.unwrap();

        assert_eq!(store.mark_all_read("usr_b").await.unwrap(), 2);
        assert_eq!(store.mark_all_read("usr_b").await.unwrap(), 0);

        let b = NotificationStore::list_for_user(&store, "usr_b", 50).await.unwrap();
        assert!(b.iter().all(|n| n.read));
        let c = NotificationStore::list_for_user(&store, "usr_c", 50).await.unwrap();
        assert!(c.iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn delete_one_requires_ownership() {
        let store = store();
        let n = store.create(chat_notification("usr_b")).await.unwrap();

        assert!(!store.delete_one("usr_c", n.id).await.unwrap());
        assert_eq!(
            NotificationStore::list_for_user(&store, "usr_b", 50).await.unwrap().len(),
            1
        );

        assert!(store.delete_one("usr_b", n.id).await.unwrap());
        assert!(!store.delete_one("usr_b", n.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_keep_log_in_id_order() {
        let store = Arc::new(store());
        let mut tasks = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..2_000 {
                    store
                        .append(new_message("conv_x", &format!("{t}-{i}")))
                        .await
                        .unwrap();
                    store.create(chat_notification("usr_b")).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let inner = store.inner.lock();
        let log = &inner.messages["conv_x"];
        assert_eq!(log.len(), 16_000);
        assert!(log
            .windows(2)
            .all(|w| w[0].id < w[1].id && w[0].created_at <= w[1].created_at));
        assert!(inner.notifications.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pair_creation_yields_one_conversation() {
        let store = Arc::new(store());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let (a, b) = if i % 2 == 0 {
                    ("usr_a", "usr_b")
                } else {
                    ("usr_b", "usr_a")
                };
                store.get_or_create_private(a, b).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        let mut created = 0;
        for task in tasks {
            let (conv, was_created) = task.await.unwrap();
            ids.push(conv.id);
            created += usize::from(was_created);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(created, 1);
        assert_eq!(
            ConversationStore::list_for_user(store.as_ref(), "usr_a").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn mark_read_requires_ownership() {
        let store = store();
        let first = store.create(chat_notification("usr_b")).await.unwrap();
        let second = store.create(chat_notification("usr_b")).await.unwrap();

        assert!(!store.mark_read("usr_c", first.id).await.unwrap());
        assert!(store.mark_read("usr_b", first.id).await.unwrap());
        assert!(!store.mark_read("usr_b", 999).await.unwrap());

        let list = NotificationStore::list_for_user(&store, "usr_b", 50).await.unwrap();
        assert!(list.iter().find(|n| n.id == first.id).unwrap().read);
        assert!(!list.iter().find(|n| n.id == second.id).unwrap().read);
    }
}
