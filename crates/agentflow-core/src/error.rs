//! Error types for the agent runtime

use thiserror::Error;

use agentflow_models::TokenInfo;

/// Runtime error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// The LLM reported a context-window overflow. Surfaced only when the
    /// recovery ladder fails completely.
    #[error("Token limit exceeded: {current_tokens} > {max_tokens}")]
    TokenLimit {
        current_tokens: usize,
        max_tokens: usize,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Empty response from LLM: {0}")]
    EmptyResponse(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Maximum iteration count reached: {0}")]
    MaxIterations(usize),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Storage error: {0}")]
    Storage(#[from] agentflow_storage::StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Build a token-limit error from parsed token info.
    pub fn token_limit(info: TokenInfo) -> Self {
        Self::TokenLimit {
            current_tokens: info.current_tokens,
            max_tokens: info.max_tokens,
        }
    }
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, AgentError>;
