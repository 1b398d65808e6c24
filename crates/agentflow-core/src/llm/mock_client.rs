//! Deterministic mock LLM client for runtime tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use agentflow_models::{Message, TokenInfo, ToolCall};

use crate::error::{AgentError, Result};
use crate::tools::ToolSchema;

use super::{AskOutcome, LlmClient, ResponseFormat};

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Return a plain assistant message.
    Text(String),
    /// Return an assistant message carrying one tool call.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Return an assistant message carrying several tool calls, to
    /// exercise normalization.
    ToolCalls(Vec<ToolCall>),
    /// Report a context-window overflow.
    TokenLimit { current: usize, max: usize },
    /// Fail with an LLM error.
    Error(String),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn token_limit(current: usize, max: usize) -> Self {
        Self::TokenLimit { current, max }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// A recorded `ask` invocation.
#[derive(Debug, Clone)]
pub struct RecordedAsk {
    pub messages: Vec<Message>,
    pub tool_count: usize,
    pub response_format: Option<ResponseFormat>,
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Steps are consumed in order; once the script is exhausted the client
/// echoes the latest user message. Every request is captured for
/// verification.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    model: String,
    max_tokens: usize,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    recorded: Arc<Mutex<Vec<RecordedAsk>>>,
    delay: Duration,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 8192,
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            recorded: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// All captured requests, in call order.
    pub async fn recorded(&self) -> Vec<RecordedAsk> {
        self.recorded.lock().await.clone()
    }

    /// Number of `ask` calls observed.
    pub async fn call_count(&self) -> usize {
        self.recorded.lock().await.len()
    }

    fn fallback_answer(messages: &[Message]) -> Message {
        let text = messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| format!("mock-echo: {}", m.content()))
            .unwrap_or_else(|| "mock-ok".to_string());
        Message::assistant(text)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    async fn ask(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        response_format: Option<ResponseFormat>,
    ) -> Result<AskOutcome> {
        self.recorded.lock().await.push(RecordedAsk {
            messages: messages.to_vec(),
            tool_count: tools.len(),
            response_format,
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let step = self.script.lock().await.pop_front();
        let Some(step) = step else {
            return Ok(AskOutcome::Answer(Self::fallback_answer(messages)));
        };

        match step {
            MockStep::Text(content) => Ok(AskOutcome::Answer(Message::assistant(content))),
            MockStep::ToolCall {
                id,
                name,
                arguments,
            } => Ok(AskOutcome::Answer(Message::assistant_with_tool_calls(
                None,
                vec![ToolCall {
                    id,
                    name,
                    arguments,
                }],
            ))),
            MockStep::ToolCalls(calls) => {
                Ok(AskOutcome::Answer(Message::assistant_with_tool_calls(
                    None, calls,
                )))
            }
            MockStep::TokenLimit { current, max } => {
                Ok(AskOutcome::TokenLimit(TokenInfo::new(current, max)))
            }
            MockStep::Error(message) => Err(AgentError::Llm(message)),
        }
    }
}
