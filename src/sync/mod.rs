//! Client-side message sync — optimistic display reconciled with the store.

pub mod coordinator;
pub mod manager;
mod view;

pub use coordinator::{MessageSyncCoordinator, SendHandle};
pub use manager::SyncManager;

use crate::error::SyncError;
use crate::model::{ChatId, Message, MessageId};

/// Changes to a coordinator's displayed list, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A submitted message is shown before the store has it.
    Optimistic { chat_id: ChatId, message: Message },
    /// The store accepted a submitted message.
    Confirmed {
        chat_id: ChatId,
        pending_id: MessageId,
        message: Message,
    },
    /// The store rejected a submitted message; its entry was removed.
    RolledBack {
        chat_id: ChatId,
        pending_id: MessageId,
        error: SyncError,
    },
    /// A refetch merged `added` new confirmed messages.
    Refreshed { chat_id: ChatId, added: usize },
    FetchFailed { error: SyncError },
}
