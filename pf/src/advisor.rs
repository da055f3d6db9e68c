//! Recommendation advisor
//!
//! Drives the session state machine:
//!
//! ```text
//! created -> awaiting_recommendation -> awaiting_feedback -> awaiting_recommendation | closed
//! ```
//!
//! Every mutating operation claims the session's single-flight slot first,
//! so a second concurrent request for the same session fails fast with
//! `Busy`. A streamed recommendation holds the slot until the upstream
//! stream ends; an upstream error or a departed consumer leaves the session
//! exactly as it was.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::intent::{ContinuationType, FailurePolicy, IntentAnalysis, IntentClassifier, IntentOutcome};
use crate::llm::{CompletionRequest, LlmClient, StreamChunk};
use crate::prompts::{FeedbackContext, PromptLoader, TaskContext};
use crate::recommendation::{Recommendation, parse_recommendation};
use crate::session::{Flight, Session, SessionError, SessionHandle, SessionIdGenerator, SessionState, SessionStore};

/// Buffered events between the stream task and the HTTP response
const EVENT_BUFFER: usize = 32;

/// Buffered deltas between the upstream reader and the forwarder
const CHUNK_BUFFER: usize = 32;

/// Errors from advisor operations
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Missing or empty request field; the message is shown to the user
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Template error: {0}")]
    Template(String),
}

/// One event on a recommendation stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RecommendEvent {
    Chunk {
        content: String,
    },
    Complete {
        full_response: String,
        recommendation: Option<Recommendation>,
        iteration_count: u32,
    },
    Error {
        message: String,
    },
}

/// Result of a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedSession {
    pub session_id: String,
    pub iteration_count: u32,
}

/// Result of one feedback round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackResult {
    pub should_continue: bool,
    /// Absent when the intent could not be classified
    pub analysis: Option<IntentAnalysis>,
    /// Present only when the conversation continues
    pub iteration_count: Option<u32>,
}

/// Resolved decision for one feedback round
enum Decision {
    Continue {
        analysis: Option<IntentAnalysis>,
        category: ContinuationType,
        user_intent: String,
    },
    Stop {
        analysis: Option<IntentAnalysis>,
    },
}

/// Session orchestration over the store, the upstream model and the prompts
pub struct Advisor {
    store: Arc<dyn SessionStore>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    classifier: IntentClassifier,
    ids: SessionIdGenerator,
    policy: FailurePolicy,
    stream_max_tokens: u32,
    temperature: f32,
}

impl Advisor {
    pub fn new(
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        config: &Config,
    ) -> Self {
        debug!(policy = ?config.feedback.failure_policy, "Advisor::new: called");
        let classifier = IntentClassifier::new(
            llm.clone(),
            prompts.clone(),
            config.llm.complete_max_tokens,
            config.llm.temperature,
        );
        Self {
            store,
            llm,
            prompts,
            classifier,
            ids: SessionIdGenerator::new(),
            policy: config.feedback.failure_policy,
            stream_max_tokens: config.llm.stream_max_tokens,
            temperature: config.llm.temperature,
        }
    }

    /// Create a session seeded with the system/task prompt pair
    pub async fn start_session(&self, user_task: &str) -> Result<StartedSession, AdvisorError> {
        debug!(task_len = user_task.len(), "start_session: called");
        if user_task.trim().is_empty() {
            return Err(AdvisorError::Validation("用户任务不能为空".to_string()));
        }

        let template = self
            .prompts
            .task_template()
            .map_err(|e| AdvisorError::Template(e.to_string()))?;
        let system = self
            .prompts
            .system_prompt()
            .map_err(|e| AdvisorError::Template(e.to_string()))?;
        let task_message = self
            .prompts
            .task_message(&TaskContext {
                template: &template,
                task: user_task,
            })
            .map_err(|e| AdvisorError::Template(e.to_string()))?;

        let mut session = Session::new(self.ids.next_id(), user_task);
        session.start(system, task_message)?;
        let started = StartedSession {
            session_id: session.id.clone(),
            iteration_count: session.iteration_count,
        };

        self.store.insert(session).await;
        info!(session_id = %started.session_id, "Started session");
        Ok(started)
    }

    /// Stream the next assistant turn
    ///
    /// Lookup, single-flight and state errors are returned before any event
    /// is produced. Afterwards the receiver yields zero or more `Chunk`
    /// events followed by exactly one `Complete` or `Error`, then closes.
    /// Dropping the receiver cancels the upstream read.
    pub async fn recommend_stream(&self, session_id: &str) -> Result<mpsc::Receiver<RecommendEvent>, AdvisorError> {
        debug!(%session_id, "recommend_stream: called");
        let handle = self.lookup(session_id).await?;
        let flight = handle.try_begin()?;

        let messages = {
            let session = flight.read().await;
            session.ensure_state(SessionState::AwaitingRecommendation)?;
            session.messages.clone()
        };

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let task = StreamTask {
            llm: self.llm.clone(),
            request: CompletionRequest::new(messages, self.stream_max_tokens, self.temperature),
            session_id: session_id.to_string(),
        };
        tokio::spawn(task.run(flight, event_tx));

        Ok(event_rx)
    }

    /// Classify feedback and advance the session
    pub async fn analyze_feedback(&self, session_id: &str, feedback: &str) -> Result<FeedbackResult, AdvisorError> {
        debug!(%session_id, feedback_len = feedback.len(), "analyze_feedback: called");
        let handle = self.lookup(session_id).await?;
        if feedback.trim().is_empty() {
            return Err(AdvisorError::Validation("用户反馈不能为空".to_string()));
        }
        let flight = handle.try_begin()?;

        let history = {
            let session = flight.read().await;
            session.ensure_state(SessionState::AwaitingFeedback)?;
            session.conversation_log.clone()
        };

        let outcome = self.classifier.classify(feedback, &history).await;
        let decision = self.decide(outcome, feedback);

        match decision {
            Decision::Continue {
                analysis,
                category,
                user_intent,
            } => {
                let user_turn = self
                    .prompts
                    .feedback_message(
                        category.template_name(),
                        &FeedbackContext {
                            feedback,
                            user_intent: &user_intent,
                        },
                    )
                    .map_err(|e| AdvisorError::Template(e.to_string()))?;

                let mut session = flight.write().await;
                session.record_feedback(feedback);
                session.continue_with(user_turn, &user_intent, category)?;
                info!(%session_id, %category, iteration = session.iteration_count, "Feedback continues session");
                Ok(FeedbackResult {
                    should_continue: true,
                    analysis,
                    iteration_count: Some(session.iteration_count),
                })
            }
            Decision::Stop { analysis } => {
                let mut session = flight.write().await;
                session.record_feedback(feedback);
                session.close()?;
                info!(%session_id, iteration = session.iteration_count, "Feedback closes session");
                Ok(FeedbackResult {
                    should_continue: false,
                    analysis,
                    iteration_count: None,
                })
            }
        }
    }

    /// Apply the failure policy to a classifier outcome
    fn decide(&self, outcome: IntentOutcome, feedback: &str) -> Decision {
        match outcome {
            IntentOutcome::Continue { analysis, category } => Decision::Continue {
                user_intent: analysis.user_intent.clone(),
                analysis: Some(analysis),
                category,
            },
            IntentOutcome::Stop { analysis } => Decision::Stop {
                analysis: Some(analysis),
            },
            IntentOutcome::Unknown if self.policy.continues() => {
                warn!("Intent unknown, continuing under fail-open policy");
                Decision::Continue {
                    analysis: None,
                    category: ContinuationType::Addition,
                    user_intent: feedback.to_string(),
                }
            }
            IntentOutcome::Unknown => {
                warn!("Intent unknown, stopping under fail-closed policy");
                Decision::Stop { analysis: None }
            }
        }
    }

    /// Current copy of a session
    pub async fn session(&self, session_id: &str) -> Result<Session, AdvisorError> {
        debug!(%session_id, "session: called");
        Ok(self.lookup(session_id).await?.snapshot().await)
    }

    /// Remove a session from the store
    pub async fn end_session(&self, session_id: &str) -> Result<(), AdvisorError> {
        debug!(%session_id, "end_session: called");
        self.store
            .remove(session_id)
            .await
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()).into())
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    async fn lookup(&self, session_id: &str) -> Result<SessionHandle, AdvisorError> {
        if session_id.trim().is_empty() {
            return Err(AdvisorError::Validation("无效的会话ID".to_string()));
        }
        self.store
            .get(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()).into())
    }
}

/// Background half of a streamed recommendation
struct StreamTask {
    llm: Arc<dyn LlmClient>,
    request: CompletionRequest,
    session_id: String,
}

impl StreamTask {
    async fn run(self, flight: Flight, events: mpsc::Sender<RecommendEvent>) {
        debug!(session_id = %self.session_id, "StreamTask::run: called");
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_BUFFER);

        let (result, _) = tokio::join!(
            self.llm.stream(self.request, chunk_tx),
            forward_chunks(chunk_rx, &events)
        );

        match result {
            Ok(response) => {
                let recommendation = parse_recommendation(&response.content);
                let recorded = {
                    let mut session = flight.write().await;
                    session
                        .record_assistant_turn(&response.content, recommendation.clone())
                        .map(|_| session.iteration_count)
                };
                match recorded {
                    Ok(iteration_count) => {
                        info!(
                            session_id = %self.session_id,
                            %iteration_count,
                            has_recommendation = recommendation.is_some(),
                            "Recommendation turn complete"
                        );
                        let complete = RecommendEvent::Complete {
                            full_response: response.content,
                            recommendation,
                            iteration_count,
                        };
                        if events.send(complete).await.is_err() {
                            debug!("StreamTask::run: consumer left before completion event");
                        }
                    }
                    Err(e) => {
                        error!(session_id = %self.session_id, error = %e, "Failed to record assistant turn");
                        let _ = events
                            .send(RecommendEvent::Error {
                                message: "服务器内部错误".to_string(),
                            })
                            .await;
                    }
                }
            }
            Err(e) if e.is_cancelled() => {
                info!(session_id = %self.session_id, "Recommendation stream cancelled by consumer");
            }
            Err(e) => {
                if e.is_configuration() {
                    error!(session_id = %self.session_id, error = %e, "Upstream not configured");
                } else {
                    error!(session_id = %self.session_id, error = %e, "Recommendation stream failed");
                }
                let _ = events
                    .send(RecommendEvent::Error {
                        message: "API调用失败".to_string(),
                    })
                    .await;
            }
        }

        // Release the session before the consumer sees the stream close
        drop(flight);
        drop(events);
    }
}

/// Relay text deltas as chunk events until either side goes away
async fn forward_chunks(mut chunks: mpsc::Receiver<StreamChunk>, events: &mpsc::Sender<RecommendEvent>) {
    while let Some(chunk) = chunks.recv().await {
        match chunk {
            StreamChunk::TextDelta(content) if !content.is_empty() => {
                if events.send(RecommendEvent::Chunk { content }).await.is_err() {
                    debug!("forward_chunks: consumer gone, dropping upstream");
                    return;
                }
            }
            StreamChunk::TextDelta(_) => {}
            StreamChunk::MessageDone { finish_reason } => {
                debug!(?finish_reason, "forward_chunks: upstream done");
            }
        }
    }
}
