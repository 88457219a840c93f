//! Chat and message data model shared by the dialogue, store, and sync layers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier.
///
/// Confirmed ids come from the store, pending ids are minted locally for
/// optimistic display. Keeping them in separate variants means a temporary
/// token can never be mistaken for a server id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Confirmed(i64),
    Pending(Uuid),
}

impl MessageId {
    /// Mint a fresh temporary id for an optimistic message.
    pub fn new_pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => write!(f, "{id}"),
            Self::Pending(token) => write!(f, "pending:{token}"),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant", alias = "bot")]
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "assistant",
        }
    }

    /// Parse a stored role string. Unknown values are treated as bot output.
    pub fn from_db(s: &str) -> Self {
        match s {
            "user" => Self::User,
            _ => Self::Bot,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the store has durably accepted a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Confirmed,
    Optimistic,
}

/// A chat as owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub created_at: DateTime<Utc>,
}

/// A single chat message, either confirmed by the store or shown optimistically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub origin: Origin,
}

impl Message {
    /// Build a store-confirmed message.
    pub fn confirmed(
        id: i64,
        chat_id: ChatId,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::Confirmed(id),
            chat_id,
            role,
            content: content.into(),
            timestamp,
            origin: Origin::Confirmed,
        }
    }

    /// Build an optimistic message with a fresh temporary id.
    pub fn optimistic(
        chat_id: ChatId,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new_pending(),
            chat_id,
            role,
            content: content.into(),
            timestamp,
            origin: Origin::Optimistic,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.origin == Origin::Optimistic
    }

    /// Same logical message as `other`: same chat, author, and text.
    pub fn is_twin_of(&self, other: &Message) -> bool {
        self.chat_id == other.chat_id && self.role == other.role && self.content == other.content
    }

    /// Ordering key for confirmed history: timestamp, then server id.
    pub(crate) fn sort_key(&self) -> (DateTime<Utc>, i64) {
        let id = match self.id {
            MessageId::Confirmed(id) => id,
            MessageId::Pending(_) => i64::MAX,
        };
        (self.timestamp, id)
    }
}

/// Body of a message send: the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
        }
    }
}
