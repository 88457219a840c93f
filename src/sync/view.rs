//! ChatView — the displayed message list of one chat.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::model::{ChatId, Message, MessageId, Role};

/// Confirmed history plus optimistic entries awaiting the store.
///
/// Confirmed messages are only ever added (merged by id), never removed.
/// Optimistic entries live from `push_optimistic` until `remove_pending`,
/// or until a confirmed twin of the in-flight entry shows up in a fetch.
#[derive(Debug)]
pub(crate) struct ChatView {
    chat_id: ChatId,
    confirmed: Vec<Message>,
    seen: HashSet<MessageId>,
    pending: Vec<Message>,
    in_flight: Option<MessageId>,
    last_error: Option<SyncError>,
}

impl ChatView {
    pub(crate) fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            confirmed: Vec::new(),
            seen: HashSet::new(),
            pending: Vec::new(),
            in_flight: None,
            last_error: None,
        }
    }

    /// Append an optimistic user message after everything currently shown.
    pub(crate) fn push_optimistic(&mut self, content: String) -> Message {
        let message = Message::optimistic(self.chat_id, Role::User, content, self.next_timestamp());
        self.pending.push(message.clone());
        message
    }

    /// Now, unless something already displayed is later.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let latest = self
            .confirmed
            .last()
            .into_iter()
            .chain(self.pending.last())
            .map(|m| m.timestamp)
            .max();
        let now = Utc::now();
        match latest {
            Some(latest) if latest > now => latest,
            _ => now,
        }
    }

    pub(crate) fn set_in_flight(&mut self, id: Option<MessageId>) {
        self.in_flight = id;
    }

    /// Drop an optimistic entry. Returns false if it was already gone.
    pub(crate) fn remove_pending(&mut self, id: MessageId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|m| m.id != id);
        self.pending.len() != before
    }

    /// Union `fetched` into the confirmed history.
    ///
    /// Returns the number of messages not seen before.
    pub(crate) fn merge(&mut self, fetched: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in fetched {
            if message.is_optimistic() || !self.seen.insert(message.id) {
                continue;
            }
            self.hide_in_flight_twin(&message);
            self.confirmed.push(message);
            added += 1;
        }
        if added > 0 {
            self.confirmed.sort_by_key(Message::sort_key);
            self.restamp_pending();
        }
        added
    }

    /// Keep optimistic entries no earlier than the newest confirmed message,
    /// so the displayed list stays in timestamp order.
    fn restamp_pending(&mut self) {
        let Some(latest) = self.confirmed.last().map(|m| m.timestamp) else {
            return;
        };
        for message in &mut self.pending {
            if message.timestamp < latest {
                message.timestamp = latest;
            }
        }
    }

    fn hide_in_flight_twin(&mut self, confirmed: &Message) {
        let Some(in_flight) = self.in_flight else {
            return;
        };
        let is_twin = self
            .pending
            .iter()
            .any(|m| m.id == in_flight && m.is_twin_of(confirmed));
        if is_twin {
            self.remove_pending(in_flight);
            tracing::debug!(
                chat_id = %self.chat_id,
                pending_id = %in_flight,
                confirmed_id = %confirmed.id,
                "Optimistic entry superseded by confirmed twin"
            );
        }
    }

    /// Confirmed history in store order, then optimistic entries in
    /// submission order.
    pub(crate) fn displayed(&self) -> Vec<Message> {
        self.confirmed
            .iter()
            .chain(self.pending.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    pub(crate) fn last_error(&self) -> Option<SyncError> {
        self.last_error.clone()
    }

    pub(crate) fn set_last_error(&mut self, error: Option<SyncError>) {
        self.last_error = error;
    }
}
