//! Error types for the intake chat.

use crate::model::ChatId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown store backend: {0} (expected \"sql\" or \"memory\")")]
    UnknownBackend(String),
}

/// Errors raised at the chat store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Chat {0} not found")]
    ChatNotFound(ChatId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed store response: {0}")]
    Decode(String),
}

/// Errors surfaced by the message sync coordinator.
///
/// Store failures are never inspected beyond this split: a failed send and a
/// failed listing are the only two conditions a caller has to handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Sending to chat {chat_id} failed: {reason}")]
    SendFailed { chat_id: ChatId, reason: String },

    #[error("Fetching chat {chat_id:?} failed: {reason}")]
    FetchFailed {
        chat_id: Option<ChatId>,
        reason: String,
    },

    #[error("Coordinator for chat {0} is no longer running")]
    Closed(ChatId),
}

impl SyncError {
    pub fn send_failed(chat_id: ChatId, err: &StoreError) -> Self {
        Self::SendFailed {
            chat_id,
            reason: err.to_string(),
        }
    }

    pub fn fetch_failed(chat_id: impl Into<Option<ChatId>>, err: &StoreError) -> Self {
        Self::FetchFailed {
            chat_id: chat_id.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
