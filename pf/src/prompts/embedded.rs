//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System role for recommendation turns
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// First user turn: task template plus the user's task
pub const TASK: &str = include_str!("../../prompts/task.pmt");

/// System role for intent analysis
pub const INTENT_SYSTEM: &str = include_str!("../../prompts/intent-system.pmt");

/// Intent analysis instructions
pub const INTENT: &str = include_str!("../../prompts/intent.pmt");

/// Feedback framing: user disputes the prior output
pub const FEEDBACK_MODIFICATION: &str = include_str!("../../prompts/feedback-modification.pmt");

/// Feedback framing: user asks a question
pub const FEEDBACK_CLARIFICATION: &str = include_str!("../../prompts/feedback-clarification.pmt");

/// Feedback framing: user adds a requirement
pub const FEEDBACK_ADDITION: &str = include_str!("../../prompts/feedback-addition.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    let found = match name {
        "system" => Some(SYSTEM),
        "task" => Some(TASK),
        "intent-system" => Some(INTENT_SYSTEM),
        "intent" => Some(INTENT),
        "feedback-modification" => Some(FEEDBACK_MODIFICATION),
        "feedback-clarification" => Some(FEEDBACK_CLARIFICATION),
        "feedback-addition" => Some(FEEDBACK_ADDITION),
        _ => None,
    };
    if found.is_none() {
        debug!("get_embedded: no match found");
    }
    found
}
