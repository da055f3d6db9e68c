//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::config::PromptsConfig;

/// Context for the first user turn
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext<'a> {
    /// Task template text read from disk
    pub template: &'a str,
    /// The user's task
    pub task: &'a str,
}

/// Context for the intent analysis prompt
#[derive(Debug, Clone, Serialize)]
pub struct IntentContext<'a> {
    /// Session conversation log
    pub history: &'a str,
    /// Latest user feedback
    pub feedback: &'a str,
}

/// Context for a feedback-derived user turn
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackContext<'a> {
    pub feedback: &'a str,
    pub user_intent: &'a str,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Override directory for `.pmt` files (also holds the task template)
    dir: Option<PathBuf>,
    /// Task template file
    task_template: PathBuf,
}

impl PromptLoader {
    /// Create a loader for the configured prompts directory
    pub fn new(config: &PromptsConfig) -> Self {
        debug!(dir = ?config.dir, task_template = %config.task_template, "PromptLoader::new: called");
        let dir_exists = config.dir.is_dir();
        if dir_exists {
            debug!("PromptLoader::new: prompts directory found");
        } else {
            debug!("PromptLoader::new: no prompts directory, embedded templates only");
        }

        Self {
            hbs: Self::engine(),
            dir: if dir_exists { Some(config.dir.clone()) } else { None },
            task_template: config.task_template_path(),
        }
    }

    /// Prompt text is plain text, not HTML
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a `.pmt` template by name
    ///
    /// Checks in order:
    /// 1. Override: `{prompts dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        let template = self.load_template(name)?;
        // Trailing newlines of the template file are not part of the message
        self.hbs
            .render_template(template.trim_end(), context)
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }

    /// Read the task template from disk
    ///
    /// There is no embedded fallback: a missing file is an error.
    pub fn task_template(&self) -> Result<String> {
        debug!(path = ?self.task_template, "PromptLoader::task_template: called");
        let content = std::fs::read_to_string(&self.task_template)
            .map_err(|e| eyre!("Failed to read task template {}: {}", self.task_template.display(), e))?;
        info!("Loaded task template from {}", self.task_template.display());
        Ok(content)
    }

    /// System role for recommendation turns
    pub fn system_prompt(&self) -> Result<String> {
        self.render("system", &())
    }

    /// First user turn combining the task template and the user's task
    pub fn task_message(&self, context: &TaskContext<'_>) -> Result<String> {
        self.render("task", context)
    }

    /// System role for intent analysis
    pub fn intent_system_prompt(&self) -> Result<String> {
        self.render("intent-system", &())
    }

    /// Intent analysis instructions for the latest feedback
    pub fn intent_prompt(&self, context: &IntentContext<'_>) -> Result<String> {
        self.render("intent", context)
    }

    /// Feedback-derived user turn using the named framing template
    pub fn feedback_message(&self, template_name: &str, context: &FeedbackContext<'_>) -> Result<String> {
        debug!(%template_name, "PromptLoader::feedback_message: called");
        self.render(template_name, context)
    }
}
