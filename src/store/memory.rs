//! In-memory `ChatStore` — for tests and the `memory` backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::ChatStore;
use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage};

#[derive(Default)]
struct Inner {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    next_chat_id: i64,
    next_message_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Strictly increasing timestamps, even when the clock doesn't move.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn push(&mut self, chat_id: ChatId, message: NewMessage) -> Message {
        let id = self.next_message_id;
        self.next_message_id += 1;
        let timestamp = self.stamp();
        let stored = Message::confirmed(id, chat_id, message.role, message.content, timestamp);
        self.messages.push(stored.clone());
        debug!(chat_id = %chat_id, message_id = id, role = %stored.role, "Message stored in memory");
        stored
    }

    fn ensure_chat(&self, chat_id: ChatId) -> Result<(), StoreError> {
        if self.chats.iter().any(|c| c.id == chat_id) {
            Ok(())
        } else {
            Err(StoreError::ChatNotFound(chat_id))
        }
    }
}

/// Process-local chat store. Ids start at 1, like a fresh SQL table.
pub struct InMemoryChatStore {
    inner: RwLock<Inner>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_chat_id: 1,
                next_message_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_chat(&self) -> Result<Chat, StoreError> {
        let mut inner = self.inner.write().await;
        let chat = Chat {
            id: ChatId(inner.next_chat_id),
            created_at: inner.stamp(),
        };
        inner.next_chat_id += 1;
        inner.chats.push(chat.clone());
        debug!(chat_id = %chat.id, "Chat created in memory");
        Ok(chat)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        Ok(self.inner.read().await.chats.clone())
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        inner.ensure_chat(chat_id)?;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(Message::sort_key);
        Ok(messages)
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        inner.ensure_chat(chat_id)?;
        Ok(inner.push(chat_id, message))
    }

    async fn append_messages(
        &self,
        chat_id: ChatId,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut inner = self.inner.write().await;
        inner.ensure_chat(chat_id)?;
        Ok(messages
            .into_iter()
            .map(|message| inner.push(chat_id, message))
            .collect())
    }
}
