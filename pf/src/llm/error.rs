//! LLM error types

use thiserror::Error;

/// Errors that can occur while calling the upstream model
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not configured: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream consumer went away")]
    Cancelled,
}

impl LlmError {
    /// Check if this is a configuration problem rather than a transport one
    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::MissingApiKey(_))
    }

    /// Check if the call ended because the consumer disconnected
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configuration() {
        assert!(LlmError::MissingApiKey("DEEPSEEK_API_KEY".to_string()).is_configuration());
        assert!(
            !LlmError::ApiError {
                status: 401,
                message: "unauthorized".to_string()
            }
            .is_configuration()
        );
    }

    #[test]
    fn test_is_cancelled() {
        assert!(LlmError::Cancelled.is_cancelled());
        assert!(!LlmError::InvalidResponse("bad".to_string()).is_cancelled());
    }

    #[test]
    fn test_missing_key_message_names_variable() {
        let err = LlmError::MissingApiKey("MY_KEY".to_string());
        assert!(err.to_string().contains("MY_KEY"));
    }
}
