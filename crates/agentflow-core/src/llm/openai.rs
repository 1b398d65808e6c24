//! OpenAI-compatible LLM provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentflow_models::{Message, ToolCall};

use crate::error::{AgentError, Result};
use crate::llm::token_limit::parse_token_limit;
use crate::tools::ToolSchema;
use crate::utils::json::parse_arguments;

use super::{AskOutcome, LlmClient, ResponseFormat};

// Truncate error bodies to prevent leaking large or sensitive responses.
const MAX_ERROR_BODY: usize = 512;

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl OpenAiClient {
    /// Create a new client against the official endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 128_000,
            temperature: None,
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the context-window size reported by `max_tokens()`
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    r#type: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}

fn to_wire(message: &Message) -> WireMessage {
    match message {
        Message::System { content } => WireMessage {
            role: "system",
            content: Some(content.clone()),
            tool_call_id: None,
            tool_calls: None,
        },
        Message::User { content } => WireMessage {
            role: "user",
            content: Some(content.clone()),
            tool_call_id: None,
            tool_calls: None,
        },
        Message::Assistant {
            content,
            tool_calls,
        } => WireMessage {
            role: "assistant",
            content: if content.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(content.clone())
            },
            tool_call_id: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(
                    tool_calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.id.clone(),
                            r#type: "function",
                            function: WireFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            },
        },
        Message::Tool {
            call_id, content, ..
        } => WireMessage {
            role: "tool",
            content: Some(content.clone()),
            tool_call_id: Some(call_id.clone()),
            tool_calls: None,
        },
    }
}

fn truncate_error_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let cut = body
        .char_indices()
        .take_while(|(idx, _)| *idx < MAX_ERROR_BODY)
        .last()
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);
    format!("{}... [truncated]", &body[..cut])
}

#[async_trait]
impl LlmClient for OpenAiClient {
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
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_wire).collect(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(
                    tools
                        .iter()
                        .map(|schema| WireTool {
                            r#type: "function",
                            function: WireFunction {
                                name: schema.name.clone(),
                                description: schema.description.clone(),
                                parameters: schema.parameters.clone(),
                            },
                        })
                        .collect(),
                )
            },
            temperature: self.temperature,
            response_format,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            // A context overflow is a recovery signal, not a failure.
            if let Some(info) = parse_token_limit(&body) {
                tracing::warn!(
                    current = info.current_tokens,
                    max = info.max_tokens,
                    "Provider reported token limit exceeded"
                );
                return Ok(AskOutcome::TokenLimit(info));
            }

            return Err(AgentError::Llm(format!(
                "HTTP {status}: {}",
                truncate_error_body(&body)
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::EmptyResponse("no choices in completion".to_string()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let raw = Value::String(call.function.arguments);
                ToolCall {
                    id: call.id.unwrap_or_default(),
                    name: call.function.name,
                    arguments: parse_arguments(&raw),
                }
            })
            .collect();

        Ok(AskOutcome::Answer(Message::assistant_with_tool_calls(
            choice.message.content,
            tool_calls,
        )))
    }
}
