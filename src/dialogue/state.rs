//! Intake flow states and the turn shapes the engine emits.

use std::fmt;

use serde::Serialize;

/// The steps of the intake conversation.
///
/// Progresses Start → AskIntent → AskName → AskAge → AskSlot → Confirmed →
/// AskRepeat, looping back to AskIntent or ending. `Confirmed` is passed
/// through within a single step and never waits for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Start,
    AskIntent,
    AskName,
    AskAge,
    AskSlot,
    Confirmed,
    AskRepeat,
    End(Closing),
}

/// Why the conversation ended; selects the closing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Closing {
    /// User was not looking to schedule.
    Declined,
    /// User is under the age limit.
    Ineligible,
    /// User finished and needs nothing else.
    Goodbye,
}

impl FlowState {
    /// Whether this state is absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End(_))
    }

    /// Stable tag for logs and status output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AskIntent => "ask_intent",
            Self::AskName => "ask_name",
            Self::AskAge => "ask_age",
            Self::AskSlot => "ask_slot",
            Self::Confirmed => "confirmed",
            Self::AskRepeat => "ask_repeat",
            Self::End(_) => "end",
        }
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::Start
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The shape of input a state is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum ExpectedInput {
    /// A closed yes/no answer.
    YesNo,
    /// Any non-empty text, e.g. a name.
    FreeText,
    /// One of the offered slot labels.
    Slots(Vec<String>),
    /// Nothing: the conversation is over or the state is transient.
    Closed,
}

/// One bot message produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotTurn {
    /// Text shown to the user.
    pub prompt: String,
    /// What the engine expects next.
    pub expected: ExpectedInput,
    /// Selectable labels, in display order (possibly empty).
    pub options: Vec<String>,
}

impl BotTurn {
    /// A turn that asks a yes/no question.
    pub fn yes_no(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expected: ExpectedInput::YesNo,
            options: vec!["Yes".to_string(), "No".to_string()],
        }
    }

    /// A turn that asks for free text.
    pub fn free_text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expected: ExpectedInput::FreeText,
            options: Vec::new(),
        }
    }

    /// A turn offering a list of slots.
    pub fn slots(prompt: impl Into<String>, slots: &[String]) -> Self {
        Self {
            prompt: prompt.into(),
            expected: ExpectedInput::Slots(slots.to_vec()),
            options: slots.to_vec(),
        }
    }

    /// A statement that expects no reply.
    pub fn statement(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expected: ExpectedInput::Closed,
            options: Vec::new(),
        }
    }

    /// The same turn with `prefix` prepended to its prompt.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.prompt = format!("{prefix} {}", self.prompt);
        self
    }

    /// Plain-text form for transcripts: slot offers list their options,
    /// numbered from 1.
    pub fn render(&self) -> String {
        match &self.expected {
            ExpectedInput::Slots(_) if !self.options.is_empty() => {
                let mut text = self.prompt.clone();
                for (i, option) in self.options.iter().enumerate() {
                    text.push_str(&format!("\n{}. {option}", i + 1));
                }
                text
            }
            _ => self.prompt.clone(),
        }
    }
}
