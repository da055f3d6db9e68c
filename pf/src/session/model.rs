//! Session domain type
//!
//! A session is one user's task-to-recommendation conversation. It owns the
//! full message history sent upstream, a human-readable conversation log
//! used as intent-analysis context, and every recommendation parsed so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SessionError;
use crate::intent::ContinuationType;
use crate::llm::Message;
use crate::recommendation::Recommendation;

/// Characters of each assistant reply kept in the conversation log
const SUMMARY_CHARS: usize = 200;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Allocated, history not yet seeded
    #[default]
    Created,
    /// Next step is streaming an assistant turn
    AwaitingRecommendation,
    /// Next step is user feedback
    AwaitingFeedback,
    /// User is satisfied; no further transitions
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AwaitingRecommendation => write!(f, "awaiting_recommendation"),
            Self::AwaitingFeedback => write!(f, "awaiting_feedback"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// In-memory conversation state for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    /// The user's original task text
    pub user_task: String,

    /// Message history sent upstream on every recommendation turn
    pub messages: Vec<Message>,

    /// Append-only log, not machine-parsed
    pub conversation_log: String,

    /// Starts at 1; +1 per continuing feedback round
    pub iteration_count: u32,

    /// Every recommendation parsed so far, oldest first
    pub recommendations: Vec<Recommendation>,

    pub state: SessionState,

    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an unseeded session
    pub fn new(id: impl Into<String>, user_task: impl Into<String>) -> Self {
        let id = id.into();
        let user_task = user_task.into();
        debug!(%id, "Session::new: called");
        Self {
            id,
            user_task,
            messages: Vec::new(),
            conversation_log: String::new(),
            iteration_count: 1,
            recommendations: Vec::new(),
            state: SessionState::Created,
            created_at: Utc::now(),
        }
    }

    /// Fail with `InvalidState` unless the session is in `expected`
    pub fn ensure_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            debug!(%self.id, %expected, actual = %self.state, "Session::ensure_state: mismatch");
            Err(SessionError::InvalidState {
                id: self.id.clone(),
                expected,
                actual: self.state,
            })
        }
    }

    /// Seed the system/user prompt pair and wait for the first recommendation
    pub fn start(&mut self, system_prompt: String, task_message: String) -> Result<(), SessionError> {
        debug!(%self.id, "Session::start: called");
        self.ensure_state(SessionState::Created)?;
        self.messages = vec![Message::system(system_prompt), Message::user(task_message)];
        self.conversation_log = format!("用户初始任务: {}\n", self.user_task);
        self.state = SessionState::AwaitingRecommendation;
        Ok(())
    }

    /// Record a completed assistant turn
    ///
    /// Exactly one assistant message is appended whether or not a
    /// recommendation was parsed from it.
    pub fn record_assistant_turn(
        &mut self,
        full_response: &str,
        recommendation: Option<Recommendation>,
    ) -> Result<(), SessionError> {
        debug!(%self.id, has_recommendation = recommendation.is_some(), "Session::record_assistant_turn: called");
        self.ensure_state(SessionState::AwaitingRecommendation)?;

        self.messages.push(Message::assistant(full_response));
        let summary: String = full_response.chars().take(SUMMARY_CHARS).collect();
        self.conversation_log
            .push_str(&format!("\n第{}轮AI回复摘要: {}...\n", self.iteration_count, summary));
        if let Some(recommendation) = recommendation {
            self.recommendations.push(recommendation);
        }
        self.state = SessionState::AwaitingFeedback;
        Ok(())
    }

    /// Log a feedback line for the current round
    pub fn record_feedback(&mut self, feedback: &str) {
        debug!(%self.id, "Session::record_feedback: called");
        self.conversation_log
            .push_str(&format!("\n第{}轮用户反馈: {}\n", self.iteration_count, feedback));
    }

    /// Start the next round with a feedback-derived user turn
    pub fn continue_with(
        &mut self,
        user_turn: String,
        user_intent: &str,
        category: ContinuationType,
    ) -> Result<(), SessionError> {
        debug!(%self.id, %category, "Session::continue_with: called");
        self.ensure_state(SessionState::AwaitingFeedback)?;
        self.messages.push(Message::user(user_turn));
        self.iteration_count += 1;
        self.conversation_log
            .push_str(&format!("用户意图: {} (类型: {})\n", user_intent, category));
        self.state = SessionState::AwaitingRecommendation;
        Ok(())
    }

    /// End the conversation
    pub fn close(&mut self) -> Result<(), SessionError> {
        debug!(%self.id, "Session::close: called");
        self.ensure_state(SessionState::AwaitingFeedback)?;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Most recent recommendation, if any
    pub fn final_recommendation(&self) -> Option<&Recommendation> {
        self.recommendations.last()
    }

    pub fn assistant_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == crate::llm::Role::Assistant).count()
    }
}
