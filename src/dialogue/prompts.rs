//! Bot copy for every step of the intake flow.

use super::state::Closing;

pub const WELCOME: &str = "Welcome to the HealthCare Scheduler.";
pub const ASK_INTENT: &str = "Are you looking to schedule a vaccination?";
pub const ASK_NAME: &str = "Great! Can I have your name, please?";
pub const ASK_AGE: &str = "Thanks! Are you above 18 years old?";
pub const OFFER_SLOTS: &str = "Here are the available slots. Which one do you prefer?";
pub const NO_SLOTS: &str = "I'm sorry, no slots are available right now.";
pub const ASK_REPEAT: &str = "Do you need another service?";
pub const FALLBACK: &str = "I'm sorry, I didn't understand that. Could you please try again?";

/// Confirmation echoing the chosen slot.
pub fn confirmation(slot: &str) -> String {
    format!("Your appointment is scheduled for {slot}.")
}

/// Closing message for a finished conversation.
pub fn closing(reason: Closing) -> &'static str {
    match reason {
        Closing::Declined => {
            "No problem. If you change your mind, the HealthCare Scheduler is here to help. Goodbye!"
        }
        Closing::Ineligible => {
            "I'm sorry, you must be above 18 years old to schedule a vaccination here. Goodbye!"
        }
        Closing::Goodbye => "Thank you for using the HealthCare Scheduler. Goodbye!",
    }
}
