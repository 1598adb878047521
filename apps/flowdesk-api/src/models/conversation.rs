use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::conversations;

/// Room id of the singleton public conversation.
pub const PUBLIC_ROOM: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Public,
    Private,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Public => "public",
            ConversationKind::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    /// Empty for the public conversation, exactly two ids for private ones.
    pub participant_ids: Vec<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_public(&self) -> bool {
        self.kind == ConversationKind::Public
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == user_id)
    }

    /// Whether `user_id` may read from or join this conversation.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.is_public() || self.has_participant(user_id)
    }

    /// The room a connection joins to receive this conversation's messages.
    pub fn room_id(&self) -> &str {
        if self.is_public() {
            PUBLIC_ROOM
        } else {
            &self.id
        }
    }
}

/// Order-independent key for a private pair: the two ids sorted and joined.
pub fn pair_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{user_a}:{user_b}")
    } else {
        format!("{user_b}:{user_a}")
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversations)]
pub struct ConversationRow {
    pub id: String,
    pub kind: String,
    pub participant_ids: Vec<String>,
    pub pair_key: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        let kind = if row.kind == "public" {
            ConversationKind::Public
        } else {
            ConversationKind::Private
        };
        Self {
            id: row.id,
            kind,
            participant_ids: row.participant_ids,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversationRow<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub participant_ids: Vec<String>,
    pub pair_key: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
