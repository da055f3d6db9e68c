//! Prompt Template System
//!
//! Two kinds of prompt text are used:
//!
//! - The task template (`prompts/default.txt` by default) is a runtime asset
//!   and must exist on disk; sessions cannot start without it.
//! - Internal `.pmt` templates (system role, intent analysis, feedback
//!   framing) load from `{prompts dir}/{name}.pmt` when present and fall back
//!   to copies embedded in the binary.
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{FeedbackContext, IntentContext, PromptLoader, TaskContext};
