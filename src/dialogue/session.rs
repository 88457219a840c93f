//! ConversationSession — one chat's flow state plus its turn history.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::engine::{Capture, DialogueEngine, Step};
use super::state::{BotTurn, FlowState};
use crate::model::{ChatId, Message, MessageId, Role};

/// What one completed pass through the flow collected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeRecord {
    pub name: Option<String>,
    pub slot: Option<String>,
}

/// Holds the authoritative turn history of a chat and the flow state derived
/// from it.
///
/// The state is updated incrementally on every `advance`; `from_history`
/// rebuilds it by replaying the user messages of a stored history, and the
/// two always agree. Calls take `&mut self`, so a shared session has to sit
/// behind a per-chat lock or queue.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    chat_id: ChatId,
    engine: Arc<DialogueEngine>,
    state: FlowState,
    history: Vec<Message>,
    draft: IntakeRecord,
    records: Vec<IntakeRecord>,
    next_id: i64,
}

impl ConversationSession {
    /// Open a fresh session: runs the opening transition and records the
    /// welcome message.
    pub fn new(chat_id: ChatId, engine: Arc<DialogueEngine>) -> Self {
        let mut session = Self::empty(chat_id, engine);
        let opening = session.engine.start();
        session.apply(FlowState::Start, opening);
        session
    }

    /// Rebuild a session from a stored history without appending anything.
    pub fn from_history(chat_id: ChatId, engine: Arc<DialogueEngine>, messages: &[Message]) -> Self {
        let mut session = Self::empty(chat_id, engine);
        session.state = session.engine.start().next;
        for msg in messages.iter().filter(|m| m.role == Role::User) {
            let step = session.engine.step(session.state, &msg.content);
            session.state = step.next;
            session.absorb(step.capture);
        }
        session.history = messages.to_vec();
        session.next_id = messages
            .iter()
            .filter_map(|m| match m.id {
                MessageId::Confirmed(id) => Some(id + 1),
                MessageId::Pending(_) => None,
            })
            .max()
            .unwrap_or(1);
        debug!(chat_id = %chat_id, state = %session.state, replayed = messages.len(), "Session restored");
        session
    }

    fn empty(chat_id: ChatId, engine: Arc<DialogueEngine>) -> Self {
        Self {
            chat_id,
            engine,
            state: FlowState::Start,
            history: Vec::new(),
            draft: IntakeRecord::default(),
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Feed one user input and return the turn now awaiting a reply.
    pub fn advance(&mut self, raw: &str) -> BotTurn {
        let mut turns = self.respond(raw);
        turns.pop().unwrap_or_else(|| self.engine.prompt(self.state))
    }

    /// Feed one user input and return every bot turn it produced.
    ///
    /// A slot choice yields two: the confirmation and the repeat question.
    pub fn respond(&mut self, raw: &str) -> Vec<BotTurn> {
        let from = self.state;
        let step = self.engine.step(from, raw);
        self.push(Role::User, raw.trim());
        self.apply(from, step)
    }

    fn apply(&mut self, from: FlowState, step: Step) -> Vec<BotTurn> {
        debug!(
            chat_id = %self.chat_id,
            from = %from,
            to = %step.next,
            via = ?step.via,
            fallback = step.fallback,
            "Flow transition"
        );
        self.state = step.next;
        self.absorb(step.capture);
        for turn in &step.turns {
            self.push(Role::Bot, &turn.render());
        }
        if step.next.is_terminal() && !from.is_terminal() {
            info!(chat_id = %self.chat_id, bookings = self.records.len(), "Conversation finished");
        }
        step.turns
    }

    fn absorb(&mut self, capture: Option<Capture>) {
        match capture {
            Some(Capture::Name(name)) => self.draft.name = Some(name),
            Some(Capture::Slot(slot)) => {
                self.draft.slot = Some(slot);
                self.records.push(std::mem::take(&mut self.draft));
            }
            None => {}
        }
    }

    fn push(&mut self, role: Role, content: &str) {
        let timestamp = self.next_timestamp();
        self.history.push(Message::confirmed(
            self.next_id,
            self.chat_id,
            role,
            content,
            timestamp,
        ));
        self.next_id += 1;
    }

    /// Now, or just after the last message if the clock hasn't moved.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.history.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn current_state(&self) -> FlowState {
        self.state
    }

    /// The prompt the session is currently waiting on.
    pub fn pending_prompt(&self) -> BotTurn {
        self.engine.prompt(self.state)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Bookings completed in this session, oldest first.
    pub fn records(&self) -> &[IntakeRecord] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
