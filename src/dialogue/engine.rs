//! Pure transition function for the intake flow.
//!
//! The engine never looks at message counts. What it is waiting for is a
//! function of the current state alone, so inserting fallback turns can never
//! shift a later step, and replaying the user inputs of a history from
//! `Start` lands on the same state every time.

use super::classifier::{ClassifiedInput, classify};
use super::prompts;
use super::state::{BotTurn, Closing, ExpectedInput, FlowState};

/// Slots offered when no catalogue is configured.
pub const DEFAULT_SLOTS: &[&str] = &[
    "Tomorrow at 10 AM",
    "Tomorrow at 3 PM",
    "Friday at 2 PM",
    "Monday at 11 AM",
];

/// Static inputs of the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Appointment slot labels, in display order.
    pub slots: Vec<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Data picked up from the user during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Name(String),
    Slot(String),
}

/// Outcome of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// State the conversation waits in after this step.
    pub next: FlowState,
    /// Transient state passed through on the way to `next`, if any.
    pub via: Option<FlowState>,
    /// Bot turns to show, in order. Never empty; the last one is the pending prompt.
    pub turns: Vec<BotTurn>,
    /// The input was not understood and the pending prompt is being re-issued.
    pub fallback: bool,
    pub capture: Option<Capture>,
}

impl Step {
    fn to(next: FlowState, turn: BotTurn) -> Self {
        Self {
            next,
            via: None,
            turns: vec![turn],
            fallback: false,
            capture: None,
        }
    }

    fn with_turn(mut self, turn: BotTurn) -> Self {
        self.turns.push(turn);
        self
    }

    fn with_capture(mut self, capture: Capture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// The turn now awaiting the user's input.
    pub fn pending_turn(&self) -> &BotTurn {
        // `turns` is never empty by construction
        &self.turns[self.turns.len() - 1]
    }
}

/// The intake state machine.
#[derive(Debug, Clone, Default)]
pub struct DialogueEngine {
    config: FlowConfig,
}

impl DialogueEngine {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    pub fn slots(&self) -> &[String] {
        &self.config.slots
    }

    /// The automatic opening transition out of `Start`.
    pub fn start(&self) -> Step {
        Step::to(
            FlowState::AskIntent,
            self.prompt(FlowState::AskIntent).prefixed(prompts::WELCOME),
        )
    }

    /// The prompt a state issues while waiting for input.
    pub fn prompt(&self, state: FlowState) -> BotTurn {
        match state {
            FlowState::Start => self.start().turns.remove(0),
            FlowState::AskIntent => BotTurn::yes_no(prompts::ASK_INTENT),
            FlowState::AskName => BotTurn::free_text(prompts::ASK_NAME),
            FlowState::AskAge => BotTurn::yes_no(prompts::ASK_AGE),
            FlowState::AskSlot => BotTurn::slots(prompts::OFFER_SLOTS, self.slots()),
            FlowState::Confirmed | FlowState::AskRepeat => BotTurn::yes_no(prompts::ASK_REPEAT),
            FlowState::End(reason) => BotTurn::statement(prompts::closing(reason)),
        }
    }

    /// The input kind a state is waiting for.
    pub fn expected(&self, state: FlowState) -> ExpectedInput {
        self.prompt(state).expected
    }

    /// Classify raw text against what `state` expects, then transition.
    pub fn step(&self, state: FlowState, raw: &str) -> Step {
        let input = classify(raw, &self.expected(state));
        self.transition(state, &input)
    }

    /// Run one transition. Total: every (state, input) pair yields a step.
    pub fn transition(&self, state: FlowState, input: &ClassifiedInput) -> Step {
        use ClassifiedInput as In;
        use FlowState as S;

        match (state, input) {
            (S::Start, _) => self.start(),
            (S::End(reason), _) => Step::to(state, BotTurn::statement(prompts::closing(reason))),

            (S::AskIntent, In::Affirm) => Step::to(S::AskName, self.prompt(S::AskName)),
            (S::AskIntent, In::Deny) => self.end(Closing::Declined),

            (S::AskName, In::FreeText(name)) => Step::to(S::AskAge, self.prompt(S::AskAge))
                .with_capture(Capture::Name(name.clone())),

            (S::AskAge, In::Affirm) if self.slots().is_empty() => Step::to(
                S::AskRepeat,
                BotTurn::statement(prompts::NO_SLOTS),
            )
            .with_turn(self.prompt(S::AskRepeat)),
            (S::AskAge, In::Affirm) => Step::to(S::AskSlot, self.prompt(S::AskSlot)),
            (S::AskAge, In::Deny) => self.end(Closing::Ineligible),

            (S::AskSlot, In::SlotChoice(slot)) if self.slots().contains(slot) => {
                let mut step = Step::to(
                    S::AskRepeat,
                    BotTurn::statement(prompts::confirmation(slot)),
                )
                .with_turn(self.prompt(S::AskRepeat))
                .with_capture(Capture::Slot(slot.clone()));
                step.via = Some(S::Confirmed);
                step
            }

            // Confirmed never waits; input there is answered as the repeat question.
            (S::Confirmed, _) => self.transition(S::AskRepeat, input),

            (S::AskRepeat, In::Affirm) => Step::to(S::AskIntent, self.prompt(S::AskIntent)),
            (S::AskRepeat, In::Deny) => self.end(Closing::Goodbye),

            (waiting, _) => self.fallback(waiting),
        }
    }

    /// Replay raw user inputs from `Start`, returning the final state and
    /// every bot turn emitted along the way (the opening turn included).
    pub fn replay<'a>(&self, inputs: impl IntoIterator<Item = &'a str>) -> (FlowState, Vec<BotTurn>) {
        let opening = self.start();
        let mut state = opening.next;
        let mut turns = opening.turns;
        for raw in inputs {
            let step = self.step(state, raw);
            state = step.next;
            turns.extend(step.turns);
        }
        (state, turns)
    }

    fn end(&self, reason: Closing) -> Step {
        Step::to(FlowState::End(reason), self.prompt(FlowState::End(reason)))
    }

    fn fallback(&self, state: FlowState) -> Step {
        let mut step = Step::to(state, self.prompt(state).prefixed(prompts::FALLBACK));
        step.fallback = true;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DialogueEngine {
        DialogueEngine::default()
    }

    #[test]
    fn start_asks_intent_with_yes_no() {
        let step = engine().start();
        assert_eq!(step.next, FlowState::AskIntent);
        let turn = step.pending_turn();
        assert!(turn.prompt.contains(prompts::ASK_INTENT));
        assert!(turn.prompt.starts_with(prompts::WELCOME));
        assert_eq!(turn.options, vec!["Yes", "No"]);
    }

    #[test]
    fn yes_at_intent_asks_for_name() {
        let step = engine().step(FlowState::AskIntent, "Yes");
        assert_eq!(step.next, FlowState::AskName);
        assert_eq!(step.pending_turn().prompt, prompts::ASK_NAME);
        assert_eq!(step.pending_turn().expected, ExpectedInput::FreeText);
        assert!(step.pending_turn().options.is_empty());
    }

    #[test]
    fn no_at_intent_ends_declined() {
        let step = engine().step(FlowState::AskIntent, "no");
        assert_eq!(step.next, FlowState::End(Closing::Declined));
        assert_eq!(step.pending_turn().prompt, prompts::closing(Closing::Declined));
    }

    #[test]
    fn name_captured_then_age_asked() {
        let step = engine().step(FlowState::AskName, " Alice ");
        assert_eq!(step.next, FlowState::AskAge);
        assert_eq!(step.capture, Some(Capture::Name("Alice".to_string())));
        assert_eq!(step.pending_turn().prompt, prompts::ASK_AGE);
        assert_eq!(step.pending_turn().options, vec!["Yes", "No"]);
    }

    #[test]
    fn no_at_age_is_ineligible() {
        let step = engine().step(FlowState::AskAge, "No");
        assert_eq!(step.next, FlowState::End(Closing::Ineligible));
        assert!(step.pending_turn().prompt.contains("18"));
    }

    #[test]
    fn yes_at_age_offers_configured_slots() {
        let step = engine().step(FlowState::AskAge, "yes");
        assert_eq!(step.next, FlowState::AskSlot);
        assert_eq!(step.pending_turn().options, DEFAULT_SLOTS);
    }

    #[test]
    fn empty_catalogue_skips_to_repeat() {
        let engine = DialogueEngine::new(FlowConfig { slots: vec![] });
        let step = engine.step(FlowState::AskAge, "yes");
        assert_eq!(step.next, FlowState::AskRepeat);
        assert_eq!(step.turns[0].prompt, prompts::NO_SLOTS);
    }

    #[test]
    fn slot_choice_confirms_then_asks_repeat() {
        let step = engine().step(FlowState::AskSlot, "Friday at 2 PM");
        assert_eq!(step.via, Some(FlowState::Confirmed));
        assert_eq!(step.next, FlowState::AskRepeat);
        assert_eq!(step.turns.len(), 2);
        assert!(step.turns[0].prompt.contains("Friday at 2 PM"));
        assert_eq!(step.turns[1].prompt, prompts::ASK_REPEAT);
        assert_eq!(step.turns[1].options, vec!["Yes", "No"]);
        assert_eq!(step.capture, Some(Capture::Slot("Friday at 2 PM".to_string())));
    }

    #[test]
    fn repeat_yes_restarts_and_no_says_goodbye() {
        let step = engine().step(FlowState::AskRepeat, "yes");
        assert_eq!(step.next, FlowState::AskIntent);
        assert_eq!(step.pending_turn().prompt, prompts::ASK_INTENT);

        let step = engine().step(FlowState::AskRepeat, "no");
        assert_eq!(step.next, FlowState::End(Closing::Goodbye));
    }

    #[test]
    fn unrecognized_reissues_same_prompt() {
        let engine = engine();
        for state in [
            FlowState::AskIntent,
            FlowState::AskAge,
            FlowState::AskSlot,
            FlowState::AskRepeat,
        ] {
            let step = engine.step(state, "banana");
            assert!(step.fallback, "{state} should fall back");
            assert_eq!(step.next, state);
            let turn = step.pending_turn();
            assert!(turn.prompt.starts_with(prompts::FALLBACK));
            assert_eq!(turn.expected, engine.expected(state));
            assert_eq!(turn.options, engine.prompt(state).options);
        }
    }

    #[test]
    fn empty_name_falls_back() {
        let step = engine().step(FlowState::AskName, "   ");
        assert!(step.fallback);
        assert_eq!(step.next, FlowState::AskName);
    }

    #[test]
    fn end_is_absorbing() {
        let engine = engine();
        let end = FlowState::End(Closing::Goodbye);
        for raw in ["yes", "no", "hello", ""] {
            let step = engine.step(end, raw);
            assert_eq!(step.next, end);
            assert!(!step.fallback);
            assert_eq!(step.pending_turn().prompt, prompts::closing(Closing::Goodbye));
        }
    }

    #[test]
    fn fallbacks_do_not_shift_later_steps() {
        let engine = engine();
        let (clean, _) = engine.replay(["yes", "Alice", "yes", "Friday at 2 PM"]);
        let (noisy, _) =
            engine.replay(["huh", "yes", "", "Alice", "perhaps", "yes", "Sunday", "Friday at 2 PM"]);
        assert_eq!(clean, FlowState::AskRepeat);
        assert_eq!(noisy, clean);
    }

    #[test]
    fn full_booking_loop_then_goodbye() {
        let (state, turns) = engine().replay([
            "yes",
            "Alice",
            "yes",
            "2",
            "yes",
            "yes",
            "Bob",
            "yes",
            "Monday at 11 AM",
            "no",
        ]);
        assert_eq!(state, FlowState::End(Closing::Goodbye));
        assert!(turns.iter().any(|t| t.prompt.contains("Tomorrow at 3 PM")));
        assert!(turns.iter().any(|t| t.prompt.contains("Monday at 11 AM")));
    }
}
