use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::notifications;

use super::message::serialize_i64_as_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Process,
    Incident,
    Chat,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Process => "process",
            NotificationKind::Incident => "incident",
            NotificationKind::Chat => "chat",
            NotificationKind::System => "system",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "process" => NotificationKind::Process,
            "incident" => NotificationKind::Incident,
            "chat" => NotificationKind::Chat,
            _ => NotificationKind::System,
        }
    }
}

/// A durable push notification owned by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Notification {
    #[serde(serialize_with = "serialize_i64_as_string")]
    #[schema(value_type = String)]
    pub id: i64,
    pub user_id: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

/// Input to `NotificationStore::create`.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub message: String,
    pub link: Option<String>,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notifications)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            read: row.read,
            link: row.link,
            kind: NotificationKind::parse(&row.kind),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow<'a> {
    pub id: i64,
    pub user_id: &'a str,
    pub message: &'a str,
    pub read: bool,
    pub link: Option<&'a str>,
    pub kind: &'a str,
    pub created_at: DateTime<Utc>,
}
