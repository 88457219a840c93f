//! Keyword classifier: maps raw user text onto the symbols the flow engine reads.

use std::sync::LazyLock;

use regex::Regex;

use super::state::ExpectedInput;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is valid"));

const AFFIRM_TOKENS: &[&str] = &["yes", "y", "yeah", "yep", "true"];
const DENY_TOKENS: &[&str] = &["no", "n", "nope", "nah", "false"];

/// User input reduced to what the engine needs to decide a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedInput {
    Affirm,
    Deny,
    FreeText(String),
    SlotChoice(String),
    /// Didn't match the expected kind, or matched it ambiguously.
    Unrecognized,
}

/// Classify `raw` against the input kind the conversation is waiting for.
///
/// Never fails; anything that cannot be matched with confidence is
/// `Unrecognized`.
pub fn classify(raw: &str, expected: &ExpectedInput) -> ClassifiedInput {
    match expected {
        ExpectedInput::YesNo => classify_yes_no(raw),
        ExpectedInput::FreeText => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                ClassifiedInput::Unrecognized
            } else {
                ClassifiedInput::FreeText(trimmed.to_string())
            }
        }
        ExpectedInput::Slots(options) => classify_slot(raw, options),
        ExpectedInput::Closed => ClassifiedInput::Unrecognized,
    }
}

fn classify_yes_no(raw: &str) -> ClassifiedInput {
    let lowered = raw.to_lowercase();
    let mut affirm = false;
    let mut deny = false;
    for word in WORD.find_iter(&lowered).map(|m| m.as_str()) {
        affirm |= AFFIRM_TOKENS.contains(&word);
        deny |= DENY_TOKENS.contains(&word);
    }
    match (affirm, deny) {
        (true, false) => ClassifiedInput::Affirm,
        (false, true) => ClassifiedInput::Deny,
        _ => ClassifiedInput::Unrecognized,
    }
}

fn classify_slot(raw: &str, options: &[String]) -> ClassifiedInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ClassifiedInput::Unrecognized;
    }

    if let Some(exact) = options.iter().find(|o| o.as_str() == trimmed) {
        return ClassifiedInput::SlotChoice(exact.clone());
    }

    let lowered = trimmed.to_lowercase();
    let mut folded = options.iter().filter(|o| o.to_lowercase() == lowered);
    if let (Some(only), None) = (folded.next(), folded.next()) {
        return ClassifiedInput::SlotChoice(only.clone());
    }

    // 1-based position in the offered list
    if let Ok(n) = trimmed.parse::<usize>() {
        if let Some(label) = n.checked_sub(1).and_then(|i| options.get(i)) {
            return ClassifiedInput::SlotChoice(label.clone());
        }
    }

    ClassifiedInput::Unrecognized
}
