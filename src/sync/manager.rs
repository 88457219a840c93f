//! SyncManager — one coordinator per open chat.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::coordinator::MessageSyncCoordinator;
use crate::error::SyncError;
use crate::model::{Chat, ChatId};
use crate::store::ChatStore;

/// Opens, tracks, and closes chat coordinators over a shared store.
pub struct SyncManager {
    store: Arc<dyn ChatStore>,
    coordinators: RwLock<HashMap<ChatId, Arc<MessageSyncCoordinator>>>,
}

impl SyncManager {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            coordinators: RwLock::new(HashMap::new()),
        }
    }

    /// Create a chat on the store.
    pub async fn create_chat(&self) -> Result<Chat, SyncError> {
        let chat = self
            .store
            .create_chat()
            .await
            .map_err(|e| SyncError::fetch_failed(None::<ChatId>, &e))?;
        info!(chat_id = %chat.id, "Chat created");
        Ok(chat)
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, SyncError> {
        self.store
            .list_chats()
            .await
            .map_err(|e| SyncError::fetch_failed(None::<ChatId>, &e))
    }

    /// Return the chat's coordinator, starting it with a first fetch if it
    /// isn't open yet. A failed first fetch leaves the chat closed.
    pub async fn open(&self, chat_id: ChatId) -> Result<Arc<MessageSyncCoordinator>, SyncError> {
        if let Some(existing) = self.get(chat_id).await {
            return Ok(existing);
        }

        let coordinator = Arc::new(MessageSyncCoordinator::spawn(
            chat_id,
            Arc::clone(&self.store),
        ));
        coordinator.refresh().await?;

        let mut coordinators = self.coordinators.write().await;
        // Another caller may have opened it while we were fetching.
        let entry = coordinators
            .entry(chat_id)
            .or_insert_with(|| Arc::clone(&coordinator));
        info!(chat_id = %chat_id, "Chat opened");
        Ok(Arc::clone(entry))
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<Arc<MessageSyncCoordinator>> {
        self.coordinators.read().await.get(&chat_id).cloned()
    }

    /// Forget a chat's coordinator. Queued sends still complete.
    pub async fn close(&self, chat_id: ChatId) -> bool {
        let removed = self.coordinators.write().await.remove(&chat_id).is_some();
        if removed {
            info!(chat_id = %chat_id, "Chat closed");
        }
        removed
    }

    pub async fn open_chats(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.coordinators.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}
