//! Property-based tests for the intake flow.

use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::model::ChatId;

fn arb_input() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yes".to_string()),
        Just("No".to_string()),
        Just("Alice".to_string()),
        Just("Friday at 2 PM".to_string()),
        Just("2".to_string()),
        Just(String::new()),
        "[a-zA-Z0-9 ]{0,20}",
    ]
}

fn arb_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        Just(FlowState::Start),
        Just(FlowState::AskIntent),
        Just(FlowState::AskName),
        Just(FlowState::AskAge),
        Just(FlowState::AskSlot),
        Just(FlowState::Confirmed),
        Just(FlowState::AskRepeat),
        Just(FlowState::End(Closing::Declined)),
        Just(FlowState::End(Closing::Ineligible)),
        Just(FlowState::End(Closing::Goodbye)),
    ]
}

proptest! {
    #[test]
    fn step_is_total(state in arb_state(), raw in arb_input()) {
        let step = DialogueEngine::default().step(state, &raw);
        prop_assert!(!step.turns.is_empty());
        prop_assert_ne!(step.next, FlowState::Start);
        prop_assert_ne!(step.next, FlowState::Confirmed);
    }

    #[test]
    fn fallback_keeps_state(state in arb_state(), raw in arb_input()) {
        let step = DialogueEngine::default().step(state, &raw);
        // Confirmed never waits, so its fallback lands on the repeat question
        if step.fallback && state != FlowState::Confirmed {
            prop_assert_eq!(step.next, state);
            prop_assert_eq!(step.turns.len(), 1);
        }
    }

    #[test]
    fn replay_is_deterministic(inputs in prop::collection::vec(arb_input(), 0..20)) {
        let engine = Arc::new(DialogueEngine::default());
        let mut session = ConversationSession::new(ChatId(1), Arc::clone(&engine));
        let mut live_turns = Vec::new();
        for raw in &inputs {
            live_turns.extend(session.respond(raw));
        }

        let (state, turns) = engine.replay(inputs.iter().map(String::as_str));
        prop_assert_eq!(state, session.current_state());
        // replay includes the opening turn
        prop_assert_eq!(&turns[1..], &live_turns[..]);

        let restored = ConversationSession::from_history(ChatId(1), engine, session.history());
        prop_assert_eq!(restored.current_state(), session.current_state());
    }

    #[test]
    fn end_is_absorbing(reason in prop_oneof![
        Just(Closing::Declined), Just(Closing::Ineligible), Just(Closing::Goodbye)
    ], inputs in prop::collection::vec(arb_input(), 1..10)) {
        let engine = DialogueEngine::default();
        let end = FlowState::End(reason);
        for raw in &inputs {
            let step = engine.step(end, raw);
            prop_assert_eq!(step.next, end);
            prop_assert_eq!(&step.pending_turn().prompt, prompts::closing(reason));
        }
    }
}
