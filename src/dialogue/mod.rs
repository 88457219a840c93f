//! Intake dialogue — keyword classification, the flow state machine, and the
//! per-chat session that records the exchange.
//!
//! The flow walks a user through service interest, name, age eligibility,
//! slot selection, and confirmation, then offers to start over. Everything in
//! here is synchronous and free of I/O.

pub mod classifier;
pub mod engine;
pub mod prompts;
pub mod session;
pub mod state;

#[cfg(test)]
mod proptests;

pub use classifier::{ClassifiedInput, classify};
pub use engine::{Capture, DEFAULT_SLOTS, DialogueEngine, FlowConfig, Step};
pub use session::{ConversationSession, IntakeRecord};
pub use state::{BotTurn, Closing, ExpectedInput, FlowState};
