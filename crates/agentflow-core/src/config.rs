//! Runtime configuration

use std::time::Duration;

use agentflow_models::AgentRole;

use crate::llm::ResponseFormat;

/// Configuration for one agent engine.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable agent identity; memories are keyed by `(agent_id, role)`.
    pub agent_id: String,
    pub role: AgentRole,
    pub system_prompt: String,
    /// Structured-output request forwarded verbatim to the LLM.
    pub response_format: Option<ResponseFormat>,
    /// Safety cap on loop turns.
    pub max_iterations: usize,
    /// Tool retry budget: `max_retries + 1` attempts in total.
    pub max_retries: usize,
    /// Fixed delay between tool attempts.
    pub retry_interval: Duration,
    /// Message count that triggers memory cleanup.
    pub cleanup_threshold: usize,
    /// Messages preserved at the tail during cleanup.
    pub keep_recent: usize,
    /// Overlap between adjacent content segments, in words.
    pub word_boundary: usize,
    /// Target token size for one content segment.
    pub segment_target_tokens: usize,
    /// Budget for the rolling summary during segmented processing.
    pub summary_context_size: usize,
    /// Estimated token count above which a tool output is compressed
    /// before being fed back to the model.
    pub tool_output_compress_threshold: usize,
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>, role: AgentRole) -> Self {
        Self {
            agent_id: agent_id.into(),
            role,
            system_prompt: String::new(),
            response_format: None,
            max_iterations: 100,
            max_retries: 3,
            retry_interval: Duration::from_secs(1),
            cleanup_threshold: 20,
            keep_recent: 8,
            word_boundary: 100,
            segment_target_tokens: 2000,
            summary_context_size: 500,
            tool_output_compress_threshold: 3000,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_cleanup_threshold(mut self, threshold: usize) -> Self {
        self.cleanup_threshold = threshold;
        self
    }

    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    pub fn with_tool_output_compress_threshold(mut self, threshold: usize) -> Self {
        self.tool_output_compress_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_contract() {
        let config = AgentConfig::new("agent-1", AgentRole::Executor);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.cleanup_threshold, 20);
        assert_eq!(config.keep_recent, 8);
        assert_eq!(config.word_boundary, 100);
        assert_eq!(config.segment_target_tokens, 2000);
        assert_eq!(config.summary_context_size, 500);
        assert_eq!(config.tool_output_compress_threshold, 3000);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AgentConfig::new("agent-1", AgentRole::Planner)
            .with_system_prompt("P")
            .with_max_iterations(5)
            .with_max_retries(1)
            .with_retry_interval(Duration::from_millis(10))
            .with_cleanup_threshold(6)
            .with_keep_recent(2);
        assert_eq!(config.system_prompt, "P");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.cleanup_threshold, 6);
        assert_eq!(config.keep_recent, 2);
    }
}
