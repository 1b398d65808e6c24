//! LLM client trait and request types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agentflow_models::{Message, TokenInfo};

use crate::error::Result;
use crate::tools::ToolSchema;

/// Structured-output request forwarded verbatim to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

/// Outcome of a chat completion.
///
/// A context-window overflow is an explicit variant, not an error: the
/// engine's recovery ladder pattern-matches on it. Everything else that
/// goes wrong is an `Err`.
#[derive(Debug, Clone)]
pub enum AskOutcome {
    /// The provider produced an assistant message.
    Answer(Message),
    /// The provider rejected the request as over the token limit.
    TokenLimit(TokenInfo),
}

/// LLM client trait.
///
/// Implementations must be safe for concurrent calls; sessions share one
/// client. Per-call options (tools, response format) are parameters, not
/// client state.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model name
    fn model(&self) -> &str;

    /// Context-window size of the model, in tokens.
    fn max_tokens(&self) -> usize;

    /// Run one chat completion over the full message history.
    async fn ask(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        response_format: Option<ResponseFormat>,
    ) -> Result<AskOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_format_wire_shape() {
        let value = serde_json::to_value(ResponseFormat::JsonObject).unwrap();
        assert_eq!(value, serde_json::json!({"type": "json_object"}));
    }
}
