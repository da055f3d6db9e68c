//! Intent classification of user feedback
//!
//! One blocking upstream call labels the latest feedback as continue-or-stop.
//! The reply is untrusted text: the first well-formed JSON object in it is
//! taken as the judgment, whatever its fields. A failed call or a reply with
//! no object yields [`IntentOutcome::Unknown`], which the caller resolves
//! through a [`FailurePolicy`].

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{IntentContext, PromptLoader};

/// Why a conversation continues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuationType {
    /// User disputes the prior output
    Modification,
    /// User is asking a question
    Clarification,
    /// User wants more or new content; also the fallback for unrecognised labels
    #[default]
    #[serde(other)]
    Addition,
}

impl ContinuationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modification => "modification",
            Self::Clarification => "clarification",
            Self::Addition => "addition",
        }
    }

    /// Name of the prompt template framing this kind of feedback
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Modification => "feedback-modification",
            Self::Clarification => "feedback-clarification",
            Self::Addition => "feedback-addition",
        }
    }
}

impl std::fmt::Display for ContinuationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The upstream model's judgment, as returned to API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    /// Missing or null means stop
    #[serde(default, deserialize_with = "lenient_bool")]
    pub should_continue: bool,

    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub user_intent: String,

    #[serde(
        default,
        deserialize_with = "lenient_continuation_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub continuation_type: Option<ContinuationType>,
}

/// Accepts booleans and their string spellings; anything else by truthiness
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Strings as-is, null as empty, other values in their JSON form
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Unrecognised labels fall back to addition; non-string values count as absent
fn lenient_continuation_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ContinuationType>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(
            serde_json::from_value(serde_json::Value::String(s)).unwrap_or_default(),
        )),
        _ => Ok(None),
    }
}

/// Tagged classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Continue {
        analysis: IntentAnalysis,
        category: ContinuationType,
    },
    Stop {
        analysis: IntentAnalysis,
    },
    /// The call failed or the reply held no JSON object
    Unknown,
}

impl IntentOutcome {
    fn from_analysis(analysis: IntentAnalysis) -> Self {
        if analysis.should_continue {
            let category = analysis.continuation_type.unwrap_or_default();
            Self::Continue { analysis, category }
        } else {
            Self::Stop { analysis }
        }
    }
}

/// How to treat [`IntentOutcome::Unknown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Assume the user wants to continue
    #[default]
    FailOpen,
    /// Assume the user is done
    FailClosed,
}

impl FailurePolicy {
    /// Whether an unclassified feedback round continues the conversation
    pub fn continues(&self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

/// Find the first well-formed JSON object embedded in `text`
pub fn extract_first_json_object(text: &str) -> Option<serde_json::Value> {
    for (idx, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next()
            && value.is_object()
        {
            return Some(value);
        }
    }
    None
}

/// Classifies feedback through the upstream model
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
    temperature: f32,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_tokens: u32, temperature: f32) -> Self {
        debug!(%max_tokens, "IntentClassifier::new: called");
        Self {
            llm,
            prompts,
            max_tokens,
            temperature,
        }
    }

    /// Classify `feedback` against the session's conversation log
    ///
    /// Never fails: every error path is logged and reported as `Unknown`.
    pub async fn classify(&self, feedback: &str, history: &str) -> IntentOutcome {
        debug!(feedback_len = feedback.len(), history_len = history.len(), "classify: called");

        let messages = match self.build_messages(feedback, history) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Failed to render intent prompt");
                return IntentOutcome::Unknown;
            }
        };

        let request = CompletionRequest::new(messages, self.max_tokens, self.temperature);
        let reply = match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, "Intent analysis call failed");
                return IntentOutcome::Unknown;
            }
        };

        let Some(value) = extract_first_json_object(&reply) else {
            warn!(reply_len = reply.len(), "Intent analysis reply contained no JSON object");
            return IntentOutcome::Unknown;
        };

        match serde_json::from_value::<IntentAnalysis>(value) {
            Ok(analysis) => {
                let outcome = IntentOutcome::from_analysis(analysis);
                info!(?outcome, "Classified feedback");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Intent analysis reply was not an object");
                IntentOutcome::Unknown
            }
        }
    }

    fn build_messages(&self, feedback: &str, history: &str) -> eyre::Result<Vec<Message>> {
        let system = self.prompts.intent_system_prompt()?;
        let user = self.prompts.intent_prompt(&IntentContext { history, feedback })?;
        Ok(vec![Message::system(system), Message::user(user)])
    }
}
