//! `ChatStore` trait — the single async interface the core persists through.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage};

/// Backend-agnostic chat/message CRUD.
///
/// The store is the single source of truth: it assigns ids and timestamps,
/// and its message lists are append-only.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a new, empty chat.
    async fn create_chat(&self) -> Result<Chat, StoreError>;

    /// All chats, oldest first (ties broken by id).
    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError>;

    /// Messages of a chat, ascending by timestamp (ties broken by id).
    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError>;

    /// Persist a message. Returns it with its server-assigned id and timestamp.
    async fn send_message(&self, chat_id: ChatId, message: NewMessage)
    -> Result<Message, StoreError>;

    /// Persist several messages of one chat in order, all or nothing.
    ///
    /// The default writes them one at a time and stops at the first failure,
    /// which can leave a prefix stored. `InMemoryChatStore` and
    /// `LibSqlChatStore` write the batch atomically.
    async fn append_messages(
        &self,
        chat_id: ChatId,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            stored.push(self.send_message(chat_id, message).await?);
        }
        Ok(stored)
    }
}
