//! Compression models shared by the compression service and memory manager

use serde::{Deserialize, Serialize};

/// Agent role. Determines which compression strategy is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planner,
    Executor,
}

impl AgentRole {
    /// Role segment used in repository keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
        }
    }
}

/// What kind of content a compression pass worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    UserInput,
    ToolOutput,
    MemoryCleanup,
}

/// Token usage reported by a token-limit error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub current_tokens: usize,
    pub max_tokens: usize,
}

impl TokenInfo {
    pub fn new(current_tokens: usize, max_tokens: usize) -> Self {
        Self {
            current_tokens,
            max_tokens,
        }
    }

    /// Tokens still available under the limit
    pub fn available_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.current_tokens)
    }

    /// Usage ratio; 0.0 when the limit is unknown
    pub fn usage_ratio(&self) -> f64 {
        if self.max_tokens == 0 {
            0.0
        } else {
            self.current_tokens as f64 / self.max_tokens as f64
        }
    }
}

/// One contiguous slice of a long text, overlapping its neighbors by a
/// fixed word boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    pub index: usize,
    pub content: String,
    pub estimated_tokens: usize,
    pub preserved_boundary: bool,
}

/// Outcome of a compression pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub original_content: String,
    pub compressed_content: String,
    pub kind: CompressionKind,
    pub original_token_count: usize,
    pub compressed_token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserved_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments_processed: Vec<ContentSegment>,
}

impl CompressionResult {
    /// A pass that changed nothing.
    pub fn unchanged(content: impl Into<String>, kind: CompressionKind, tokens: usize) -> Self {
        let content = content.into();
        Self {
            original_content: content.clone(),
            compressed_content: content,
            kind,
            original_token_count: tokens,
            compressed_token_count: tokens,
            preserved_intent: None,
            summary: None,
            segments_processed: Vec::new(),
        }
    }

    /// Fraction of tokens removed by the pass
    pub fn compression_ratio(&self) -> f64 {
        if self.original_token_count == 0 {
            return 0.0;
        }
        (self.original_token_count.saturating_sub(self.compressed_token_count)) as f64
            / self.original_token_count as f64
    }

    /// Tokens removed by the pass
    pub fn token_saved(&self) -> usize {
        self.original_token_count
            .saturating_sub(self.compressed_token_count)
    }
}
