//! Custom error types for Ferret
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Ferret operations
#[derive(Error, Debug)]
pub enum FerretError {
    /// The language model backend failed or returned an error
    #[error("Model invocation error: {0}")]
    ModelInvocation(String),

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Ollama is not running at the configured address
    #[error("Cannot reach Ollama at {0}. Start it with `ollama serve` and pull '{1}'")]
    OllamaNotReachable(String, String),

    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The control loop ran out of turns before a final answer
    #[error("Turn limit exceeded: no final answer after {max_turns} turns")]
    TurnLimitExceeded { max_turns: usize },

    /// A model or tool call did not finish in time
    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Ferret operations
pub type Result<T> = std::result::Result<T, FerretError>;

impl FerretError {
    /// Create a model invocation error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelInvocation(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            secs,
        }
    }

    /// Message without the variant label, for text fed back to the model
    pub fn detail(&self) -> String {
        match self {
            Self::ToolExecution(msg)
            | Self::ModelInvocation(msg)
            | Self::Config(msg)
            | Self::Other(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
