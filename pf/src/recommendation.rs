//! Recommendation extraction from free-form model output
//!
//! The upstream model is asked to end each reply with a flat JSON object
//! `{"model": ..., "prompt": ...}`, but nothing guarantees it does. The scan
//! here is deliberately tolerant: it looks for brace-free `{...}` spans that
//! mention both keys, takes the last one, and only then parses it as JSON.
//! Absence is an expected outcome, never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flat object mentioning `"model"` before `"prompt"`; `[^{}]` spans newlines
static CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"model"[^{}]*"prompt"[^{}]*\}"#).expect("recommendation pattern is valid")
});

/// A model name and prompt body recommended for the user's task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub model: String,
    pub prompt: String,
}

/// Extract the last embedded `{model, prompt}` object from `text`
///
/// Returns `None` when no candidate exists, the last candidate is not valid
/// JSON, or either field is missing, non-string or the empty string.
pub fn parse_recommendation(text: &str) -> Option<Recommendation> {
    debug!(text_len = text.len(), "parse_recommendation: called");
    let candidate = CANDIDATE.find_iter(text).last()?;

    let normalized = candidate.as_str().replace('\n', " ").replace('\r', "");
    let normalized = normalized.trim();

    let value: serde_json::Value = match serde_json::from_str(normalized) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "parse_recommendation: candidate is not valid JSON");
            return None;
        }
    };

    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (field("model"), field("prompt")) {
        (Some(model), Some(prompt)) => {
            debug!(%model, "parse_recommendation: found");
            Some(Recommendation { model, prompt })
        }
        _ => {
            debug!("parse_recommendation: required field missing or empty");
            None
        }
    }
}
