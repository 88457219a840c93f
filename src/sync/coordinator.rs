//! MessageSyncCoordinator — optimistic sends and refetch for one chat.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::SyncEvent;
use super::view::ChatView;
use crate::error::SyncError;
use crate::model::{ChatId, Message, MessageId, NewMessage};
use crate::store::ChatStore;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// A send waiting for the chat's worker.
struct SendJob {
    pending_id: MessageId,
    content: String,
    reply: oneshot::Sender<Result<Message, SyncError>>,
}

/// State shared between the coordinator handle and its worker task.
struct Shared {
    chat_id: ChatId,
    store: Arc<dyn ChatStore>,
    view: RwLock<ChatView>,
    tx: broadcast::Sender<SyncEvent>,
}

impl Shared {
    fn emit(&self, event: SyncEvent) {
        // ok if nobody is listening
        let _ = self.tx.send(event);
    }

    /// List the chat from the store and merge it into the view.
    async fn refetch(&self) -> Result<Vec<Message>, SyncError> {
        match self.store.list_messages(self.chat_id).await {
            Ok(fetched) => {
                let (added, displayed) = {
                    let mut view = self.view.write().await;
                    let added = view.merge(fetched);
                    view.set_last_error(None);
                    (added, view.displayed())
                };
                debug!(chat_id = %self.chat_id, added, shown = displayed.len(), "Chat refetched");
                self.emit(SyncEvent::Refreshed {
                    chat_id: self.chat_id,
                    added,
                });
                Ok(displayed)
            }
            Err(e) => {
                let error = SyncError::fetch_failed(self.chat_id, &e);
                warn!(chat_id = %self.chat_id, error = %e, "Refetch failed");
                self.view.write().await.set_last_error(Some(error.clone()));
                self.emit(SyncEvent::FetchFailed {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    async fn dispatch(&self, job: SendJob) {
        let SendJob {
            pending_id,
            content,
            reply,
        } = job;
        self.view.write().await.set_in_flight(Some(pending_id));

        let result = self
            .store
            .send_message(self.chat_id, NewMessage::user(content))
            .await;

        let outcome = match result {
            Ok(stored) => {
                {
                    let mut view = self.view.write().await;
                    view.set_in_flight(None);
                    view.remove_pending(pending_id);
                    view.merge([stored.clone()]);
                }
                info!(chat_id = %self.chat_id, pending_id = %pending_id, message_id = %stored.id, "Send confirmed");
                self.emit(SyncEvent::Confirmed {
                    chat_id: self.chat_id,
                    pending_id,
                    message: stored.clone(),
                });
                // A failed refetch is recorded in the view; the send itself stands.
                let _ = self.refetch().await;
                Ok(stored)
            }
            Err(e) => {
                let error = SyncError::send_failed(self.chat_id, &e);
                {
                    let mut view = self.view.write().await;
                    view.set_in_flight(None);
                    view.remove_pending(pending_id);
                }
                warn!(chat_id = %self.chat_id, pending_id = %pending_id, error = %e, "Send failed, rolled back");
                self.emit(SyncEvent::RolledBack {
                    chat_id: self.chat_id,
                    pending_id,
                    error: error.clone(),
                });
                Err(error)
            }
        };

        if reply.send(outcome).is_err() {
            debug!(chat_id = %self.chat_id, pending_id = %pending_id, "Send handle dropped before outcome");
        }
    }
}

/// Handle to one submitted message.
#[derive(Debug)]
pub struct SendHandle {
    chat_id: ChatId,
    pending_id: MessageId,
    rx: oneshot::Receiver<Result<Message, SyncError>>,
}

impl SendHandle {
    /// Temporary id of the optimistic entry.
    pub fn pending_id(&self) -> MessageId {
        self.pending_id
    }

    /// Wait for the store to accept or reject the message.
    ///
    /// On success the view has already been refetched.
    pub async fn outcome(self) -> Result<Message, SyncError> {
        self.rx.await.unwrap_or(Err(SyncError::Closed(self.chat_id)))
    }
}

/// Owns the displayed message list of one chat.
///
/// Sends are queued to a single worker task, so they reach the store one at
/// a time in submission order. Dropping the coordinator does not cancel
/// queued sends: the worker drains its queue, then exits.
pub struct MessageSyncCoordinator {
    shared: Arc<Shared>,
    jobs: mpsc::UnboundedSender<SendJob>,
}

impl MessageSyncCoordinator {
    /// Create a coordinator and spawn its worker. Must run inside a Tokio
    /// runtime. The view starts empty; call `refresh` to load history.
    pub fn spawn(chat_id: ChatId, store: Arc<dyn ChatStore>) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let shared = Arc::new(Shared {
            chat_id,
            store,
            view: RwLock::new(ChatView::new(chat_id)),
            tx,
        });
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(Arc::clone(&shared), rx));
        debug!(chat_id = %chat_id, "Sync coordinator started");
        Self { shared, jobs }
    }

    pub fn chat_id(&self) -> ChatId {
        self.shared.chat_id
    }

    /// Subscribe to view changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.tx.subscribe()
    }

    /// Show `content` immediately and queue it for the store.
    pub async fn submit(&self, content: impl Into<String>) -> SendHandle {
        let chat_id = self.shared.chat_id;
        let optimistic = self.shared.view.write().await.push_optimistic(content.into());
        let pending_id = optimistic.id;
        debug!(chat_id = %chat_id, pending_id = %pending_id, "Optimistic message shown");

        let (reply, rx) = oneshot::channel();
        let job = SendJob {
            pending_id,
            content: optimistic.content.clone(),
            reply,
        };
        self.shared.emit(SyncEvent::Optimistic {
            chat_id,
            message: optimistic,
        });

        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            // The worker is gone; the dropped reply resolves the handle as Closed.
            self.shared.view.write().await.remove_pending(job.pending_id);
            self.shared.emit(SyncEvent::RolledBack {
                chat_id,
                pending_id,
                error: SyncError::Closed(chat_id),
            });
        }

        SendHandle {
            chat_id,
            pending_id,
            rx,
        }
    }

    /// Refetch the chat and return the displayed list.
    pub async fn refresh(&self) -> Result<Vec<Message>, SyncError> {
        self.shared.refetch().await
    }

    /// Confirmed history followed by optimistic entries.
    pub async fn messages(&self) -> Vec<Message> {
        self.shared.view.read().await.displayed()
    }

    /// Number of store-confirmed messages currently known.
    pub async fn confirmed_len(&self) -> usize {
        self.shared.view.read().await.confirmed_len()
    }

    /// Error left by the last failed refetch, cleared by the next success.
    pub async fn last_error(&self) -> Option<SyncError> {
        self.shared.view.read().await.last_error()
    }
}

impl fmt::Debug for MessageSyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSyncCoordinator")
            .field("chat_id", &self.shared.chat_id)
            .finish_non_exhaustive()
    }
}

async fn run_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<SendJob>) {
    while let Some(job) = rx.recv().await {
        shared.dispatch(job).await;
    }
    debug!(chat_id = %shared.chat_id, "Sync worker exiting");
}
