//! Error Types

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Orchestration error types
#[derive(Error, Debug)]
pub enum ChatError {
    /// Completion service error
    #[error("Completion error: {0}")]
    Completion(String),

    /// Completion service unavailable or not responding
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Tool arguments failed schema validation
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A completion or tool call exceeded its deadline
    #[error("Deadline exceeded after {0:?}")]
    Timeout(std::time::Duration),

    /// Request aborted by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Parse error (e.g., malformed completion response)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Session store error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited by the completion service
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Check if error is transient and worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::CompletionUnavailable(_) | ChatError::RateLimited(_) | ChatError::Io(_)
        )
    }

    /// Check if the error is recoverable inside the tool-calling loop.
    ///
    /// Recoverable errors are serialized into the conversation as tool-result
    /// text so the model can react; everything else aborts the request.
    pub fn is_tool_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::ToolNotFound(_)
                | ChatError::InvalidArguments(_)
                | ChatError::ToolExecution(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Completion(_) => "The assistant service encountered an error.".into(),
            ChatError::CompletionUnavailable(_) => {
                "The assistant service is currently unavailable. Please try again.".into()
            }
            ChatError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            ChatError::InvalidArguments(msg) => format!("Invalid tool input: {}", msg),
            ChatError::ToolExecution(msg) => format!("Tool error: {}", msg),
            ChatError::Timeout(_) => "The request took too long to process.".into(),
            ChatError::Cancelled => "The request was cancelled.".into(),
            ChatError::RateLimited(_) => {
                "Too many requests right now. Please wait a moment.".into()
            }
            ChatError::Auth(_) => "Authentication with the assistant service failed.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Other(err.to_string())
    }
}
