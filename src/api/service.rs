//! ChatService — server-side chat operations that drive the intake flow.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dialogue::{ConversationSession, DialogueEngine};
use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage, Role};
use crate::store::ChatStore;

/// Wraps a `ChatStore` and answers every user message with the flow's bot
/// turns.
///
/// The flow state of a chat is never cached: each post replays the stored
/// history. Posts to the same chat are serialized by a per-chat lock so two
/// replies can't interleave.
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    engine: Arc<DialogueEngine>,
    locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, engine: Arc<DialogueEngine>) -> Self {
        Self {
            store,
            engine,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn chat_lock(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(chat_id).or_default())
    }

    /// Drop the chat's lock entry once no other post holds or awaits it.
    async fn release_lock(&self, chat_id: ChatId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // the map and `lock` are the only owners left
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&chat_id);
        }
    }

    /// Create a chat and store the welcome turn.
    pub async fn create_chat(&self) -> Result<Chat, StoreError> {
        let chat = self.store.create_chat().await?;
        let welcome = self
            .engine
            .start()
            .turns
            .iter()
            .map(|turn| NewMessage::bot(turn.render()))
            .collect();
        self.store.append_messages(chat.id, welcome).await?;
        info!(chat_id = %chat.id, "Chat opened with welcome");
        Ok(chat)
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        self.store.list_chats().await
    }

    pub async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        self.store.list_messages(chat_id).await
    }

    /// Store a message. A user message is answered by the flow; it is stored
    /// together with the bot turns, all or nothing, and returned.
    pub async fn post_message(
        &self,
        chat_id: ChatId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let lock = self.chat_lock(chat_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.answer(chat_id, message).await
        };
        self.release_lock(chat_id, lock).await;
        result
    }

    async fn answer(&self, chat_id: ChatId, message: NewMessage) -> Result<Message, StoreError> {
        if message.role != Role::User {
            return self.store.send_message(chat_id, message).await;
        }

        let history = self.store.list_messages(chat_id).await?;
        let mut session = ConversationSession::from_history(chat_id, Arc::clone(&self.engine), &history);
        let turns = session.respond(&message.content);

        let mut batch = Vec::with_capacity(turns.len() + 1);
        batch.push(message);
        batch.extend(turns.iter().map(|turn| NewMessage::bot(turn.render())));
        let stored = self.store.append_messages(chat_id, batch).await?;

        debug!(
            chat_id = %chat_id,
            state = %session.current_state(),
            replies = turns.len(),
            "User message answered"
        );
        stored
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Query("append_messages stored nothing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::dialogue::prompts;
    use crate::store::InMemoryChatStore;

    /// Store that rejects the write of its `fail_at`-th message once.
    /// Batches are all or nothing, like the real backends.
    struct FailOnceStore {
        inner: InMemoryChatStore,
        fail_at: usize,
        written: AtomicUsize,
        tripped: AtomicBool,
    }

    impl FailOnceStore {
        fn new(fail_at: usize) -> Self {
            Self {
                inner: InMemoryChatStore::new(),
                fail_at,
                written: AtomicUsize::new(0),
                tripped: AtomicBool::new(false),
            }
        }

        fn reserve(&self, count: usize) -> Result<(), StoreError> {
            let written = self.written.load(Ordering::SeqCst);
            let hits = written < self.fail_at && self.fail_at <= written + count;
            if hits && !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Query("disk full".to_string()));
            }
            self.written.fetch_add(count, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ChatStore for FailOnceStore {
        async fn create_chat(&self) -> Result<Chat, StoreError> {
            self.inner.create_chat().await
        }
        async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
            self.inner.list_chats().await
        }
        async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
            self.inner.list_messages(chat_id).await
        }
        async fn send_message(
            &self,
            chat_id: ChatId,
            message: NewMessage,
        ) -> Result<Message, StoreError> {
            self.reserve(1)?;
            self.inner.send_message(chat_id, message).await
        }
        async fn append_messages(
            &self,
            chat_id: ChatId,
            messages: Vec<NewMessage>,
        ) -> Result<Vec<Message>, StoreError> {
            self.reserve(messages.len())?;
            self.inner.append_messages(chat_id, messages).await
        }
    }

    fn service() -> ChatService {
        ChatService::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::new(DialogueEngine::default()),
        )
    }

    async fn contents(service: &ChatService, chat_id: ChatId) -> Vec<String> {
        service
            .list_messages(chat_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    #[tokio::test]
    async fn new_chat_has_welcome() {
        let service = service();
        let chat = service.create_chat().await.unwrap();
        let msgs = service.list_messages(chat.id).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::Bot);
        assert!(msgs[0].content.starts_with(prompts::WELCOME));
    }

    #[tokio::test]
    async fn user_message_gets_reply() {
        let service = service();
        let chat = service.create_chat().await.unwrap();
        let stored = service
            .post_message(chat.id, NewMessage::user("Yes"))
            .await
            .unwrap();
        assert_eq!(stored.role, Role::User);
        assert_eq!(stored.content, "Yes");

        let all = contents(&service, chat.id).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], prompts::ASK_NAME);
    }

    #[tokio::test]
    async fn flow_state_survives_across_posts() {
        let service = service();
        let chat = service.create_chat().await.unwrap();
        for raw in ["yes", "Alice", "yes"] {
            service.post_message(chat.id, NewMessage::user(raw)).await.unwrap();
        }
        service
            .post_message(chat.id, NewMessage::user("Monday at 11 AM"))
            .await
            .unwrap();
        let all = contents(&service, chat.id).await;
        let tail = &all[all.len() - 2..];
        assert_eq!(tail[0], prompts::confirmation("Monday at 11 AM"));
        assert_eq!(tail[1], prompts::ASK_REPEAT);
    }

    #[tokio::test]
    async fn concurrent_posts_do_not_interleave() {
        let service = Arc::new(service());
        let chat = service.create_chat().await.unwrap();
        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.post_message(chat.id, NewMessage::user("yes")).await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.post_message(chat.id, NewMessage::user("Alice")).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let msgs = service.list_messages(chat.id).await.unwrap();
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Bot, Role::User, Role::Bot, Role::User, Role::Bot]);
    }

    #[tokio::test]
    async fn failed_reply_write_leaves_no_user_message() {
        // welcome is write 1, "yes" is write 2, its reply write 3
        let service = ChatService::new(
            Arc::new(FailOnceStore::new(3)),
            Arc::new(DialogueEngine::default()),
        );
        let chat = service.create_chat().await.unwrap();

        assert!(service.post_message(chat.id, NewMessage::user("yes")).await.is_err());
        assert_eq!(contents(&service, chat.id).await.len(), 1);

        // the retry answers "yes" exactly once
        service.post_message(chat.id, NewMessage::user("yes")).await.unwrap();
        service.post_message(chat.id, NewMessage::user("Alice")).await.unwrap();
        let all = contents(&service, chat.id).await;
        assert_eq!(all.iter().filter(|c| *c == "yes").count(), 1);
        assert_eq!(&all[1..], ["yes", prompts::ASK_NAME, "Alice", prompts::ASK_AGE]);
    }

    #[tokio::test]
    async fn chat_locks_are_released() {
        let service = Arc::new(service());
        let chat = service.create_chat().await.unwrap();
        let posts: Vec<_> = ["yes", "Alice", "yes"]
            .into_iter()
            .map(|raw| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.post_message(chat.id, NewMessage::user(raw)).await })
            })
            .collect();
        for post in posts {
            post.await.unwrap().unwrap();
        }
        assert!(service.locks.lock().await.is_empty());

        let _ = service.post_message(ChatId(77), NewMessage::user("hi")).await;
        assert!(service.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let service = service();
        let err = service
            .post_message(ChatId(3), NewMessage::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ChatNotFound(ChatId(3))));
    }
}
