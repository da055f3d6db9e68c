//! promptforge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::intent::FailurePolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Upstream model configuration
    pub llm: LlmConfig,

    /// Prompt template locations
    pub prompts: PromptsConfig,

    /// Feedback round behavior
    pub feedback: FeedbackConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stdout
    #[serde(rename = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key variable is set and the task template is readable.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }

        let template = self.prompts.task_template_path();
        if !template.is_file() {
            return Err(eyre::eyre!("Task template not found: {}", template.display()));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .promptforge.yml
        let local_config = PathBuf::from(".promptforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/promptforge/promptforge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("promptforge").join("promptforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Directory with the browser client assets
    #[serde(rename = "static-dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            static_dir: PathBuf::from("public"),
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address: CLI flag > `PORT` env > config
    pub fn resolve_bind(&self, cli_bind: Option<&str>) -> String {
        if let Some(bind) = cli_bind {
            return bind.to_string();
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.trim().parse::<u16>()
        {
            let host = self.bind.rsplit_once(':').map(|(h, _)| h).unwrap_or("0.0.0.0");
            return format!("{}:{}", host, port);
        }
        self.bind.clone()
    }
}

/// Upstream model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL (without the `/v1/chat/completions` suffix)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens for streamed recommendation turns
    #[serde(rename = "stream-max-tokens")]
    pub stream_max_tokens: u32,

    /// Maximum tokens for blocking calls (intent analysis)
    #[serde(rename = "complete-max-tokens")]
    pub complete_max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            temperature: 0.7,
            stream_max_tokens: 2000,
            complete_max_tokens: 1000,
            timeout_ms: 300_000,
        }
    }
}

/// Prompt template locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory holding the task template and `.pmt` overrides
    pub dir: PathBuf,

    /// Task template file name inside `dir`
    #[serde(rename = "task-template")]
    pub task_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prompts"),
            task_template: "default.txt".to_string(),
        }
    }
}

impl PromptsConfig {
    pub fn task_template_path(&self) -> PathBuf {
        self.dir.join(&self.task_template)
    }
}

/// Feedback round behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// What to do when the intent cannot be classified
    #[serde(rename = "failure-policy")]
    pub failure_policy: FailurePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.prompts.task_template_path(), PathBuf::from("prompts/default.txt"));
        assert_eq!(config.feedback.failure_policy, FailurePolicy::FailOpen);
    }

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();

        assert_eq!(config.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.base_url, "https://api.deepseek.com");
        assert_eq!(config.stream_max_tokens, 2000);
        assert_eq!(config.complete_max_tokens, 1000);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
server:
  bind: 127.0.0.1:8080
  static-dir: web

llm:
  model: deepseek-reasoner
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  temperature: 0.2
  stream-max-tokens: 4000
  timeout-ms: 60000

prompts:
  dir: /etc/promptforge
  task-template: task.txt

feedback:
  failure-policy: fail-closed

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.static_dir, PathBuf::from("web"));
        assert_eq!(config.llm.model, "deepseek-reasoner");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.stream_max_tokens, 4000);
        assert_eq!(config.llm.complete_max_tokens, 1000);
        assert_eq!(
            config.prompts.task_template_path(),
            PathBuf::from("/etc/promptforge/task.txt")
        );
        assert_eq!(config.feedback.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: some-model
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "some-model");
        assert_eq!(config.llm.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.feedback.failure_policy, FailurePolicy::FailOpen);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pf.yml");
        fs::write(&path, "log-level: warn\nllm:\n  model: m1\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.model, "m1");
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/promptforge.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn test_resolve_bind_priority() {
        let server = ServerConfig::default();

        // SAFETY: tests touching the environment are serialized
        unsafe { std::env::remove_var("PORT") };
        assert_eq!(server.resolve_bind(None), "0.0.0.0:3000");

        unsafe { std::env::set_var("PORT", "4100") };
        assert_eq!(server.resolve_bind(None), "0.0.0.0:4100");
        assert_eq!(server.resolve_bind(Some("127.0.0.1:9000")), "127.0.0.1:9000");

        unsafe { std::env::remove_var("PORT") };
    }

    #[test]
    #[serial]
    fn test_validate_requires_key_and_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.llm.api_key_env = "PROMPTFORGE_TEST_VALIDATE_KEY".to_string();
        config.prompts.dir = dir.path().to_path_buf();

        unsafe { std::env::remove_var("PROMPTFORGE_TEST_VALIDATE_KEY") };
        assert!(config.validate().is_err());

        unsafe { std::env::set_var("PROMPTFORGE_TEST_VALIDATE_KEY", "k") };
        assert!(config.validate().is_err(), "template still missing");

        fs::write(dir.path().join("default.txt"), "template").unwrap();
        assert!(config.validate().is_ok());

        unsafe { std::env::remove_var("PROMPTFORGE_TEST_VALIDATE_KEY") };
    }
}
