//! Postgres-backed storage via `diesel-async`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::AsyncPgConnection;

use flowdesk_common::id::{prefix, prefixed_ulid};
use flowdesk_common::{snowflake_created_at, SnowflakeGenerator};

use crate::db::pool::DbPool;
use crate::db::schema::{conversations, messages, notifications};
use crate::models::conversation::{
    pair_key, Conversation, ConversationKind, ConversationRow, NewConversationRow,
};
use crate::models::message::{Message, NewMessage, NewMessageRow};
use crate::models::notification::{
    NewNotification, NewNotificationRow, Notification, NotificationRow,
};

use super::store::{clamp_limit, ConversationStore, MessageLog, NotificationStore, StoreError};

pub struct PgStore {
    pool: DbPool,
    snowflake: Arc<SnowflakeGenerator>,
}

impl PgStore {
    pub fn new(pool: DbPool, snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, snowflake }
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        self.pool.get().await.map_err(|e| {
            tracing::error!(?e, "pool error");
            StoreError::Pool(e.to_string())
        })
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn get_or_create_public(&self) -> Result<Conversation, StoreError> {
        let mut conn = self.conn().await?;

        let public = conversations::table
            .filter(conversations::kind.eq(ConversationKind::Public.as_str()))
            .select(ConversationRow::as_select());

        let existing: Option<ConversationRow> =
            diesel_async::RunQueryDsl::get_result(public, &mut conn)
                .await
                .optional()?;
        if let Some(row) = existing {
            return Ok(row.into());
        }

        let now = Utc::now();
        let id = prefixed_ulid(prefix::CONVERSATION);
        // A concurrent creator may win the partial unique index; fall through
        // to re-fetch in that case.
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(conversations::table)
                .values(NewConversationRow {
                    id: &id,
                    kind: ConversationKind::Public.as_str(),
                    participant_ids: Vec::new(),
                    pair_key: None,
                    last_message_at: now,
                    created_at: now,
                })
                .on_conflict_do_nothing(),
            &mut conn,
        )
        .await?;

        let row: ConversationRow = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .filter(conversations::kind.eq(ConversationKind::Public.as_str()))
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await?;

        tracing::debug!(conversation_id = %row.id, "public conversation fetched after insert");
        Ok(row.into())
    }

    async fn get_or_create_private(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(Conversation, bool), StoreError> {
        let key = pair_key(user_a, user_b);
        let mut conn = self.conn().await?;

        let existing: Option<ConversationRow> = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .filter(conversations::pair_key.eq(&key))
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        if let Some(row) = existing {
            return Ok((row.into(), false));
        }

        let now = Utc::now();
        let id = prefixed_ulid(prefix::CONVERSATION);
        let inserted = diesel_async::RunQueryDsl::execute(
            diesel::insert_into(conversations::table)
                .values(NewConversationRow {
                    id: &id,
                    kind: ConversationKind::Private.as_str(),
                    participant_ids: vec![user_a.to_string(), user_b.to_string()],
                    pair_key: Some(key.clone()),
                    last_message_at: now,
                    created_at: now,
                })
                .on_conflict_do_nothing(),
            &mut conn,
        )
        .await?;

        let row: ConversationRow = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .filter(conversations::pair_key.eq(&key))
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await?;

        Ok((row.into(), inserted > 0))
    }

    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<ConversationRow> = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .find(conversation_id)
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(row.map(Conversation::from))
    }

    async fn touch_last_message_at(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::update(
                conversations::table
                    .find(conversation_id)
                    .filter(conversations::last_message_at.lt(at)),
            )
            .set(conversations::last_message_at.eq(at)),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<ConversationRow> = diesel_async::RunQueryDsl::load(
            conversations::table
                .filter(
                    conversations::kind
                        .eq(ConversationKind::Public.as_str())
                        .or(conversations::participant_ids.contains(vec![user_id.to_string()])),
                )
                .order((
                    conversations::last_message_at.desc(),
                    conversations::id.desc(),
                ))
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }
}

#[async_trait]
impl MessageLog for PgStore {
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError> {
        let id = self.snowflake.generate();
        let mut conn = self.conn().await?;

        let stored: Message = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessageRow {
                    id,
                    conversation_id: &message.conversation_id,
                    sender_id: &message.sender_id,
                    sender_name: &message.sender_name,
                    content: &message.content,
                    created_at: snowflake_created_at(id),
                })
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(stored)
    }

    async fn recent_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.conn().await?;
        let mut newest: Vec<Message> = diesel_async::RunQueryDsl::load(
            messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .order((messages::created_at.desc(), messages::id.desc()))
                .limit(clamp_limit(limit) as i64)
                .select(Message::as_select()),
            &mut conn,
        )
        .await?;
        newest.reverse();
        Ok(newest)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let id = self.snowflake.generate();
        let mut conn = self.conn().await?;

        let row: NotificationRow = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(notifications::table)
                .values(NewNotificationRow {
                    id,
                    user_id: &notification.user_id,
                    message: &notification.message,
                    read: false,
                    link: notification.link.as_deref(),
                    kind: notification.kind.as_str(),
                    created_at: snowflake_created_at(id),
                })
                .returning(NotificationRow::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(row.into())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<NotificationRow> = diesel_async::RunQueryDsl::load(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .order((notifications::created_at.desc(), notifications::id.desc()))
                .limit(clamp_limit(limit) as i64)
                .select(NotificationRow::as_select()),
            &mut conn,
        )
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let updated = diesel_async::RunQueryDsl::execute(
            diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user_id))
                    .filter(notifications::read.eq(false)),
            )
            .set(notifications::read.eq(true)),
            &mut conn,
        )
        .await?;
        Ok(updated as u64)
    }

    async fn mark_read(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let updated = diesel_async::RunQueryDsl::execute(
            diesel::update(
                notifications::table
                    .filter(notifications::id.eq(notification_id))
                    .filter(notifications::user_id.eq(user_id)),
            )
            .set(notifications::read.eq(true)),
            &mut conn,
        )
        .await?;
        Ok(updated > 0)
    }

    async fn delete_one(&self, user_id: &str, notification_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(
                notifications::table
                    .filter(notifications::id.eq(notification_id))
                    .filter(notifications::user_id.eq(user_id)),
            ),
            &mut conn,
        )
        .await?;
        Ok(deleted > 0)
    }
}
