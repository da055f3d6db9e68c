//! promptforge - iterative model and prompt recommendations
//!
//! A user describes a task, receives a recommended model and prompt from an
//! upstream chat model, gives feedback, and converges on a final
//! recommendation that can be exported.
//!
//! # Modules
//!
//! - [`advisor`] - Session state machine over the store, model and prompts
//! - [`session`] - Session data and in-memory storage
//! - [`intent`] - Feedback intent classification
//! - [`recommendation`] - Recommendation extraction from model output
//! - [`llm`] - Upstream chat completion client
//! - [`prompts`] - Prompt templates
//! - [`server`] - HTTP/SSE endpoints
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{info, warn};

pub mod advisor;
pub mod cli;
pub mod config;
pub mod intent;
pub mod llm;
pub mod prompts;
pub mod recommendation;
pub mod server;
pub mod session;

pub use advisor::{Advisor, AdvisorError, FeedbackResult, RecommendEvent, StartedSession};
pub use config::Config;
pub use intent::{ContinuationType, FailurePolicy, IntentAnalysis, IntentClassifier, IntentOutcome};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use prompts::PromptLoader;
pub use recommendation::{Recommendation, parse_recommendation};
pub use session::{InMemorySessionStore, Session, SessionError, SessionState, SessionStore};

/// Wire up the advisor from configuration
pub fn build_advisor(config: &Config) -> Result<Advisor> {
    let llm = create_client(&config.llm).context("Failed to create upstream client")?;
    let prompts = Arc::new(PromptLoader::new(&config.prompts));
    let store = Arc::new(InMemorySessionStore::new());
    Ok(Advisor::new(store, llm, prompts, config))
}

/// Run the HTTP server until Ctrl-C
///
/// A missing API key or task template only warns: the server starts and the
/// affected calls fail individually.
pub async fn run_server(config: &Config, cli_bind: Option<&str>) -> Result<()> {
    if let Err(e) = config.validate() {
        warn!("{}", e);
    }

    let bind = config.server.resolve_bind(cli_bind);
    let advisor = build_advisor(config)?;
    info!(model = %config.llm.model, policy = ?config.feedback.failure_policy, "Starting promptforge");

    let state = server::AppState {
        advisor: Arc::new(advisor),
    };
    server::serve(state, &bind, &config.server.static_dir).await
}
