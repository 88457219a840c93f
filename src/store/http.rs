//! HTTP `ChatStore` — talks to a remote intake server over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::traits::ChatStore;
use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage};

/// REST client for `/chats` and `/chats/{id}/messages`.
pub struct HttpChatStore {
    client: Client,
    base_url: String,
}

impl HttpChatStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a response into `T`, mapping 404 to `ChatNotFound` when a chat is
/// addressed.
async fn decode<T: DeserializeOwned>(
    response: Response,
    chat_id: Option<ChatId>,
) -> Result<T, StoreError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        if let Some(chat_id) = chat_id {
            return Err(StoreError::ChatNotFound(chat_id));
        }
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(status = %status, "Intake server returned an error");
        return Err(StoreError::Transport(format!("Server error ({status}): {body}")));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

#[async_trait]
impl ChatStore for HttpChatStore {
    async fn create_chat(&self) -> Result<Chat, StoreError> {
        let response = self
            .client
            .post(self.url("/chats"))
            .send()
            .await
            .map_err(transport)?;
        let chat: Chat = decode(response, None).await?;
        debug!(chat_id = %chat.id, "Chat created remotely");
        Ok(chat)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let response = self
            .client
            .get(self.url("/chats"))
            .send()
            .await
            .map_err(transport)?;
        decode(response, None).await
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/chats/{chat_id}/messages")))
            .send()
            .await
            .map_err(transport)?;
        decode(response, Some(chat_id)).await
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let response = self
            .client
            .post(self.url(&format!("/chats/{chat_id}/messages")))
            .json(&message)
            .send()
            .await
            .map_err(transport)?;
        let stored: Message = decode(response, Some(chat_id)).await?;
        debug!(chat_id = %chat_id, message_id = %stored.id, "Message sent remotely");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let store = HttpChatStore::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.base_url(), "http://localhost:8000");
        assert_eq!(store.url("/chats"), "http://localhost:8000/chats");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        // Port 9 (discard) on loopback is closed on test hosts.
        let store = HttpChatStore::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = store.list_chats().await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
