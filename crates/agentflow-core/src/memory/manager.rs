//! Count-triggered memory cleanup
//!
//! When a conversation reaches the cleanup threshold, the middle of the
//! history is folded into one summary message so that the retained memory
//! is `[system?, task?, summary, recent]`. The system prompt and the
//! original task request survive every pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use agentflow_models::{
    AgentRole, CompressionKind, CompressionResult, Memory, Message, Role,
};

use crate::llm::{AskOutcome, LlmClient};
use crate::memory::estimator::estimate_tokens;
use crate::prompts::{
    EXECUTION_HISTORY_SUMMARY_PROMPT, GENERAL_HISTORY_SUMMARY_PROMPT, render,
};
use crate::utils::text::truncate_chars;

/// Messages that mark a user turn as the original task request.
const TASK_KEYWORDS: &[&str] = &[
    "帮我", "请", "需要", "任务", "目标", "help", "please", "need", "task", "goal",
];

/// A user message longer than this is treated as a task description even
/// without a keyword.
const TASK_LENGTH_THRESHOLD: usize = 50;

/// Fallback summary length when the LLM is unavailable.
const FALLBACK_SUMMARY_CHARS: usize = 300;

/// A message only counts as compressible when it exceeds this share of
/// the model window.
const LONGEST_MESSAGE_RATIO: f64 = 0.3;

/// Memory manager enforcing the soft bound on message count.
pub struct MemoryManager {
    llm: Arc<dyn LlmClient>,
    cleanup_threshold: usize,
    keep_recent: usize,
}

impl MemoryManager {
    pub fn new(llm: Arc<dyn LlmClient>, cleanup_threshold: usize, keep_recent: usize) -> Self {
        Self {
            llm,
            cleanup_threshold,
            keep_recent,
        }
    }

    /// Whether the message count has reached the cleanup threshold.
    pub fn should_compress(&self, memory: &Memory) -> bool {
        !memory.is_empty() && memory.len() >= self.cleanup_threshold
    }

    /// Run cleanup when the threshold is reached, or unconditionally when
    /// `force` is set (the token-limit recovery path). Returns whether the
    /// memory was rewritten; the caller persists.
    pub async fn auto_manage(&self, memory: &mut Memory, role: AgentRole, force: bool) -> bool {
        if !force && !self.should_compress(memory) {
            return false;
        }
        if force {
            tracing::info!("Forced memory compression requested");
        } else {
            tracing::info!(
                threshold = self.cleanup_threshold,
                messages = memory.len(),
                "Memory size reached threshold, compressing"
            );
        }

        let result = self.compress_by_message_count(memory, role).await;
        let compressed = !result.original_content.is_empty();
        if compressed {
            tracing::info!(
                tokens_saved = result.token_saved(),
                messages = memory.len(),
                "Memory compression completed"
            );
        }
        compressed
    }

    /// Fold the middle of the history into a summary message.
    ///
    /// Retained shape: `[system?, task (when not already recent), summary,
    /// last keep_recent]`. A memory with nothing between the preserved
    /// messages is left untouched.
    pub async fn compress_by_message_count(
        &self,
        memory: &mut Memory,
        role: AgentRole,
    ) -> CompressionResult {
        let messages = memory.messages();
        let system_index = messages.first().filter(|m| m.is_system()).map(|_| 0usize);
        let task_index = find_task_message(messages);
        let recent_start = messages.len().saturating_sub(self.keep_recent);

        let mut preserved: BTreeSet<usize> = (recent_start..messages.len()).collect();
        if let Some(idx) = system_index {
            preserved.insert(idx);
        }
        if let Some(idx) = task_index {
            preserved.insert(idx);
        }

        let middle: Vec<&Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !preserved.contains(i))
            .map(|(_, m)| m)
            .collect();

        if middle.is_empty() {
            return CompressionResult::unchanged("", CompressionKind::MemoryCleanup, 0);
        }

        let task_message = task_index.map(|i| messages[i].clone());
        let middle_text = messages_to_text(&middle);
        let summary = self
            .summarize_history(&middle_text, task_message.as_ref(), role)
            .await;

        let summary_message = Message::assistant(format!("[历史对话摘要]: {summary}"));

        let mut rebuilt: Vec<Message> = Vec::with_capacity(self.keep_recent + 3);
        if let Some(idx) = system_index {
            rebuilt.push(messages[idx].clone());
        }
        if let Some(idx) = task_index
            && idx < recent_start
            && Some(idx) != system_index
        {
            rebuilt.push(messages[idx].clone());
        }
        rebuilt.push(summary_message);
        rebuilt.extend(messages[recent_start..].iter().cloned());

        let original_tokens = estimate_tokens(&middle_text);
        let compressed_tokens = estimate_tokens(&summary);
        memory.replace(rebuilt);

        CompressionResult {
            original_content: middle_text,
            compressed_content: summary.clone(),
            kind: CompressionKind::MemoryCleanup,
            original_token_count: original_tokens,
            compressed_token_count: compressed_tokens,
            preserved_intent: None,
            summary: Some(summary),
            segments_processed: Vec::new(),
        }
    }

    /// Longest non-system message, iff it exceeds 30% of the model window.
    /// Used only by the token-limit recovery path.
    pub fn find_longest_compressible(
        &self,
        memory: &Memory,
        max_tokens: usize,
    ) -> Option<(usize, Role)> {
        let mut longest: Option<(usize, Role, usize)> = None;
        for (index, message) in memory.messages().iter().enumerate() {
            if message.is_system() {
                continue;
            }
            let tokens = estimate_tokens(message.content());
            if longest.map(|(_, _, best)| tokens > best).unwrap_or(true) {
                longest = Some((index, message.role(), tokens));
            }
        }

        let (index, role, tokens) = longest?;
        if (tokens as f64) > max_tokens as f64 * LONGEST_MESSAGE_RATIO {
            Some((index, role))
        } else {
            None
        }
    }

    async fn summarize_history(
        &self,
        content: &str,
        task_message: Option<&Message>,
        role: AgentRole,
    ) -> String {
        let task_context = task_message
            .map(|m| format!("\n原始任务需求：{}", truncate_chars(m.content(), 200)))
            .unwrap_or_default();

        let template = match role {
            AgentRole::Executor => EXECUTION_HISTORY_SUMMARY_PROMPT,
            AgentRole::Planner => GENERAL_HISTORY_SUMMARY_PROMPT,
        };
        let prompt = render(
            template,
            &[("content", content), ("task_context", &task_context)],
        );

        match self.llm.ask(&[Message::user(prompt)], &[], None).await {
            Ok(AskOutcome::Answer(message)) if !message.content().trim().is_empty() => {
                message.content().to_string()
            }
            Ok(_) | Err(_) => {
                tracing::warn!("History summary failed, falling back to truncation");
                format!("{}...", truncate_chars(content, FALLBACK_SUMMARY_CHARS))
            }
        }
    }
}

/// First user message that looks like the task request: contains a task
/// keyword or is longer than the length threshold. Falls back to the
/// first user message.
fn find_task_message(messages: &[Message]) -> Option<usize> {
    let mut first_user = None;
    for (index, message) in messages.iter().enumerate() {
        if !message.is_user() {
            continue;
        }
        if first_user.is_none() {
            first_user = Some(index);
        }
        let content = message.content().to_lowercase();
        if TASK_KEYWORDS.iter().any(|kw| content.contains(kw))
            || message.content().chars().count() > TASK_LENGTH_THRESHOLD
        {
            return Some(index);
        }
    }
    first_user
}

fn messages_to_text(messages: &[&Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let role = match message.role() {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            format!("[{role}]: {}", message.content())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
