//! Agent iteration engine
//!
//! Drives one conversational model through the tool-use loop: the model
//! proposes a tool invocation, the engine executes it with bounded
//! retries, feeds the result back and repeats until the model emits a
//! terminal message or the iteration cap is reached.
//!
//! Memory is exclusively owned by the engine for the duration of an
//! `execute` call and every mutation is persisted before the next LLM
//! call or event yield, so a cancelled or crashed turn leaves a coherent
//! state behind.

use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use tokio::time::sleep;
use uuid::Uuid;

use agentflow_models::{
    AgentEvent, CompressionKind, Memory, Message, Role, TokenInfo, ToolResult,
};
use agentflow_storage::MemoryRepository;

use crate::compression::service::{CompressionConfig, CompressionService};
use crate::compression::SegmentRecord;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::llm::{AskOutcome, LlmClient, ResponseFormat};
use crate::memory::estimator::estimate_tokens;
use crate::memory::manager::MemoryManager;
use crate::tools::{Tool, ToolRegistry};
use crate::utils::json::parse_arguments;
use crate::utils::text::truncate_chars;

/// A message estimated above this share of the model window goes through
/// segmented processing instead of single-pass compression.
const SEGMENTED_PROCESSING_RATIO: f64 = 0.7;

/// Length of the request snippet kept as compression context.
const TASK_CONTEXT_CHARS: usize = 200;

/// The agent iteration engine for one `(agent_id, role)` session.
pub struct AgentEngine {
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    repository: Arc<dyn MemoryRepository>,
    compression: CompressionService,
    memory_manager: MemoryManager,
    memory: Memory,
    memory_loaded: bool,
    /// Snippet of the current request, used as the task context for
    /// tool-output compression.
    task_context: String,
}

impl AgentEngine {
    pub fn new(
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        let compression = CompressionService::new(
            llm.clone(),
            CompressionConfig {
                word_boundary: config.word_boundary,
                segment_target_tokens: config.segment_target_tokens,
                summary_context_size: config.summary_context_size,
            },
        );
        let memory_manager =
            MemoryManager::new(llm.clone(), config.cleanup_threshold, config.keep_recent);

        Self {
            config,
            llm,
            tools,
            repository,
            compression,
            memory_manager,
            memory: Memory::new(),
            memory_loaded: false,
            task_context: String::new(),
        }
    }

    /// The engine's configuration (read-only).
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current in-process memory snapshot.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Drive one turn. Events are produced in order; the stream ends
    /// after a terminal `Message` or `Error` event. Dropping the stream
    /// cancels the turn between suspension points.
    pub fn execute(
        &mut self,
        request: impl Into<String>,
    ) -> impl Stream<Item = Result<AgentEvent>> + Send + '_ {
        let request = request.into();
        try_stream! {
            self.task_context = truncate_chars(&request, TASK_CONTEXT_CHARS);
            let format = self.config.response_format;

            let mut assistant = self
                .ask_internal(vec![Message::user(request)], format)
                .await?;

            let mut iterations = 0usize;
            let mut terminal = false;
            while iterations < self.config.max_iterations {
                if assistant.tool_calls().is_empty() {
                    yield AgentEvent::Message {
                        content: assistant.content().to_string(),
                    };
                    terminal = true;
                    break;
                }

                let call = assistant.tool_calls()[0].clone();
                let call_id = if call.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    call.id.clone()
                };

                let (toolkit, tool) = match self.tools.get(&call.name) {
                    Some(entry) => (entry.toolkit.clone(), entry.tool.clone()),
                    None => {
                        tracing::warn!(tool = %call.name, "Model requested an unknown tool");
                        yield AgentEvent::Error {
                            error: format!("Unknown tool: {}", call.name),
                        };
                        // The call is skipped; ask again over the
                        // unchanged memory so the loop can continue.
                        assistant = self.ask_internal(Vec::new(), format).await?;
                        iterations += 1;
                        continue;
                    }
                };
                let arguments = parse_arguments(&call.arguments);

                yield AgentEvent::ToolCalling {
                    call_id: call_id.clone(),
                    toolkit: toolkit.clone(),
                    function_name: call.name.clone(),
                    arguments: arguments.clone(),
                };

                let result = self.invoke_with_retry(tool.as_ref(), arguments.clone()).await;
                let success = result.success;
                let mut content = result.render();

                if estimate_tokens(&content) > self.config.tool_output_compress_threshold {
                    let info = TokenInfo::new(estimate_tokens(&content), self.llm.max_tokens());
                    let context = self.task_context.clone();
                    let compressed = self
                        .compression
                        .compress_for_immediate_use(
                            &content,
                            CompressionKind::ToolOutput,
                            &context,
                            info,
                            self.config.role,
                        )
                        .await;
                    tracing::info!(
                        tool = %call.name,
                        tokens_saved = compressed.token_saved(),
                        "Compressed oversized tool output"
                    );
                    content = compressed.compressed_content;
                }

                yield AgentEvent::ToolCalled {
                    call_id: call_id.clone(),
                    toolkit,
                    function_name: call.name.clone(),
                    arguments,
                    result: content.clone(),
                    success,
                };

                assistant = self
                    .ask_internal(vec![Message::tool(call_id, call.name.clone(), content)], format)
                    .await?;
                iterations += 1;
            }

            if !terminal {
                yield AgentEvent::Error {
                    error: "Maximum iteration count reached, failed to complete the task"
                        .to_string(),
                };
            }
        }
    }

    /// Single ask with the full recovery ladder. Used by higher layers to
    /// prime an agent with prepared messages.
    pub async fn ask_with_messages(
        &mut self,
        messages: Vec<Message>,
        response_format: Option<ResponseFormat>,
    ) -> Result<Message> {
        self.ask_internal(messages, response_format).await
    }

    /// Answer or withdraw the pending `message_ask_user` call: when the
    /// last assistant message carries one, append the user's answer as its
    /// tool result; otherwise drop the last message.
    pub async fn rollback(&mut self, message: Option<String>) -> Result<()> {
        self.ensure_memory().await?;
        let pending_ask = self
            .memory
            .last()
            .and_then(|m| m.tool_calls().first())
            .filter(|call| call.name == "message_ask_user")
            .cloned();

        match (pending_ask, message) {
            (Some(call), Some(answer)) => {
                self.memory.push(Message::tool(call.id, call.name, answer));
            }
            _ => self.memory.roll_back(),
        }
        self.persist().await
    }

    /// Mask volatile viewer outputs and persist.
    pub async fn compact_memory(&mut self) -> Result<()> {
        self.ensure_memory().await?;
        self.memory.compact();
        self.persist().await
    }

    // ------------------------------------------------------------------
    // ask + recovery ladder
    // ------------------------------------------------------------------

    async fn ask_internal(
        &mut self,
        inputs: Vec<Message>,
        format: Option<ResponseFormat>,
    ) -> Result<Message> {
        self.append_to_memory(inputs).await?;

        if self
            .memory_manager
            .auto_manage(&mut self.memory, self.config.role, false)
            .await
        {
            self.persist().await?;
        }

        let schemas = self.tools.schemas();
        match self
            .llm
            .ask(self.memory.messages(), &schemas, format)
            .await?
        {
            AskOutcome::Answer(message) => self.accept_assistant(message).await,
            AskOutcome::TokenLimit(info) => self.handle_token_limit(info, format).await,
        }
    }

    /// Recovery ladder for a token-limit report, tried in order:
    /// forced memory cleanup, longest-message compression (single-pass or
    /// segmented), and finally a reduction to `[system, last user]`.
    /// Every rung persists the memory it produced before calling the LLM.
    async fn handle_token_limit(
        &mut self,
        info: TokenInfo,
        format: Option<ResponseFormat>,
    ) -> Result<Message> {
        tracing::warn!(
            current = info.current_tokens,
            max = info.max_tokens,
            "Token limit exceeded, entering recovery"
        );
        let schemas = self.tools.schemas();

        // Rung 1: forced memory cleanup.
        let mut info = info;
        self.memory_manager
            .auto_manage(&mut self.memory, self.config.role, true)
            .await;
        self.persist().await?;
        match self
            .llm
            .ask(self.memory.messages(), &schemas, format)
            .await?
        {
            AskOutcome::Answer(message) => return self.accept_assistant(message).await,
            AskOutcome::TokenLimit(next) => info = next,
        }

        // Rung 2: find the longest compressible message.
        let Some((index, role)) = self
            .memory_manager
            .find_longest_compressible(&self.memory, info.max_tokens)
        else {
            return Err(AgentError::token_limit(info));
        };
        let content = self.memory.messages()[index].content().to_string();

        // Rung 4: segmented processing for messages near the window size.
        if estimate_tokens(&content) as f64
            > info.max_tokens as f64 * SEGMENTED_PROCESSING_RATIO
        {
            return self.process_in_segments(index, &content, info, format).await;
        }

        // Rung 3: single-pass compression in place. Assistant turns are
        // the model's own output, not user input; they take the general
        // summary path instead of a role-specific rewrite.
        let context = self.task_context.clone();
        let result = match role {
            Role::Tool => {
                self.compression
                    .compress_for_immediate_use(
                        &content,
                        CompressionKind::ToolOutput,
                        &context,
                        info,
                        self.config.role,
                    )
                    .await
            }
            Role::User => {
                self.compression
                    .compress_for_immediate_use(
                        &content,
                        CompressionKind::UserInput,
                        &context,
                        info,
                        self.config.role,
                    )
                    .await
            }
            _ => {
                self.compression
                    .compress_content_general(
                        &content,
                        CompressionKind::MemoryCleanup,
                        &context,
                        info,
                    )
                    .await
            }
        };
        tracing::info!(
            index,
            tokens_saved = result.token_saved(),
            "Compressed longest message in place"
        );
        if let Some(slot) = self.memory.message_mut(index) {
            slot.set_content(result.compressed_content);
        }
        self.persist().await?;

        match self
            .llm
            .ask(self.memory.messages(), &schemas, format)
            .await?
        {
            AskOutcome::Answer(message) => self.accept_assistant(message).await,
            AskOutcome::TokenLimit(next) => self.last_resort(next, format).await,
        }
    }

    /// Rung 4: iterate the segment stream, asking the model once per
    /// segment with a rolling history summary in the rewritten slot.
    async fn process_in_segments(
        &mut self,
        slot_index: usize,
        content: &str,
        info: TokenInfo,
        format: Option<ResponseFormat>,
    ) -> Result<Message> {
        tracing::info!(
            slot_index,
            max_tokens = info.max_tokens,
            "Message exceeds window share, switching to segmented processing"
        );
        let schemas = self.tools.schemas();
        let context = self.task_context.clone();
        let mut responses: Vec<Message> = Vec::new();
        let mut token_limit_next: Option<TokenInfo> = None;

        {
            let stream =
                self.compression
                    .process_long_content_in_segments(content, &context, info.max_tokens);
            pin_mut!(stream);

            'segments: while let Some(record) = stream.next().await {
                match record {
                    SegmentRecord::Segment {
                        index,
                        total,
                        content: segment_text,
                        history_summary,
                        has_history,
                        ..
                    } => {
                        let block = if has_history {
                            format!(
                                "[历史摘要]:\n{history_summary}\n\n[当前内容 - 第{}/{}段]:\n{segment_text}",
                                index + 1,
                                total
                            )
                        } else {
                            format!("[内容 - 第{}/{}段]:\n{segment_text}", index + 1, total)
                        };
                        if let Some(slot) = self.memory.message_mut(slot_index) {
                            slot.set_content(block);
                        }
                        self.persist().await?;

                        match self
                            .llm
                            .ask(self.memory.messages(), &schemas, format)
                            .await?
                        {
                            AskOutcome::Answer(message) => {
                                if index + 1 < total {
                                    // Keep the trace coherent between
                                    // segment turns.
                                    self.memory.push(Message::assistant(format!(
                                        "已处理第{}段内容。",
                                        index + 1
                                    )));
                                    self.persist().await?;
                                }
                                responses.push(message);
                            }
                            AskOutcome::TokenLimit(next) => {
                                token_limit_next = Some(next);
                                break 'segments;
                            }
                        }
                    }
                    SegmentRecord::FinalSummary { summary, .. } => {
                        if let Some(slot) = self.memory.message_mut(slot_index) {
                            slot.set_content(format!("[内容摘要]:\n{summary}"));
                        }
                        self.persist().await?;
                    }
                }
            }
        }

        if let Some(next) = token_limit_next {
            return self.last_resort(next, format).await;
        }

        if responses.is_empty() {
            return Err(AgentError::EmptyResponse(
                "segmented processing produced no responses".to_string(),
            ));
        }

        // In JSON mode the responses cannot be concatenated; the last
        // segment's response is the merged result.
        let merged = if matches!(format, Some(ResponseFormat::JsonObject)) {
            responses
                .pop()
                .unwrap_or_else(|| Message::assistant(""))
        } else {
            let text = responses
                .iter()
                .map(|m| m.content())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            Message::assistant(text)
        };
        self.accept_assistant(merged).await
    }

    /// Rung 5: absolute fallback. Reduce the context to the system prompt
    /// and the latest user message and retry once.
    async fn last_resort(
        &mut self,
        info: TokenInfo,
        format: Option<ResponseFormat>,
    ) -> Result<Message> {
        tracing::warn!(
            current = info.current_tokens,
            max = info.max_tokens,
            "Recovery strategies exhausted, reducing context to system prompt and last user message"
        );
        let system = self.memory.system_message().cloned();
        let last_user = self
            .memory
            .messages()
            .iter()
            .rev()
            .find(|m| m.is_user())
            .cloned();

        let mut reduced = Vec::new();
        reduced.extend(system);
        reduced.extend(last_user);
        self.memory.replace(reduced);
        self.persist().await?;

        let schemas = self.tools.schemas();
        match self
            .llm
            .ask(self.memory.messages(), &schemas, format)
            .await?
        {
            AskOutcome::Answer(message) => self.accept_assistant(message).await,
            AskOutcome::TokenLimit(next) => Err(AgentError::token_limit(next)),
        }
    }

    // ------------------------------------------------------------------
    // tools
    // ------------------------------------------------------------------

    /// Invoke a tool with the fixed-delay retry budget. Exhaustion turns
    /// the last error into the tool result so the model can observe it.
    async fn invoke_with_retry(&self, tool: &dyn Tool, args: serde_json::Value) -> ToolResult {
        let mut failures = 0usize;
        loop {
            match tool.invoke(args.clone()).await {
                Ok(result) => return result,
                Err(error) => {
                    failures += 1;
                    if failures <= self.config.max_retries {
                        sleep(self.config.retry_interval).await;
                    } else {
                        tracing::error!(
                            tool = tool.name(),
                            %error,
                            "Tool execution failed after retries"
                        );
                        return ToolResult::error(error.to_string());
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // memory plumbing
    // ------------------------------------------------------------------

    async fn ensure_memory(&mut self) -> Result<()> {
        if !self.memory_loaded {
            self.memory = self
                .repository
                .get(&self.config.agent_id, self.config.role.as_str())
                .await?;
            self.memory_loaded = true;
        }
        Ok(())
    }

    async fn append_to_memory(&mut self, messages: Vec<Message>) -> Result<()> {
        self.ensure_memory().await?;
        if self.memory.is_empty() {
            self.memory.push(Message::system(&self.config.system_prompt));
        }
        self.memory.extend(messages);
        self.persist().await
    }

    async fn accept_assistant(&mut self, message: Message) -> Result<Message> {
        let message = message.normalize_tool_calls();
        self.memory.push(message.clone());
        self.persist().await?;
        Ok(message)
    }

    async fn persist(&self) -> Result<()> {
        self.repository
            .save(&self.config.agent_id, self.config.role.as_str(), &self.memory)
            .await?;
        Ok(())
    }
}
