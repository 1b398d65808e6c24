//! LLM-backed content compression
//!
//! Reduces the token count of a single piece of content (a user message,
//! a tool output, or a history window) while preserving task-relevant
//! semantics. Every LLM failure falls back to textual truncation; the
//! service never raises.

use std::sync::Arc;

use futures::Stream;

use agentflow_models::{
    AgentRole, CompressionKind, CompressionResult, Message, TokenInfo,
};

use crate::compression::segment::segment_content;
use crate::llm::{AskOutcome, LlmClient};
use crate::memory::estimator::estimate_tokens;
use crate::prompts::{
    COMBINE_SUMMARIES_PROMPT, CONTENT_SUMMARY_PROMPT, PLANNER_COMPRESSION_PROMPT,
    SEGMENT_SUMMARY_PROMPT, TOOL_OUTPUT_SUMMARY_PROMPT, USER_INTENT_PROMPT, render,
};
use crate::utils::text::{truncate_chars, truncate_words};

/// Tokens reserved for system prompt, tool definitions and the response
/// when sizing a planner rewrite.
const PLANNER_RESERVED_TOKENS: usize = 4000;
/// Floor for the planner rewrite target.
const PLANNER_MIN_TARGET: usize = 500;
/// Share of the available window the planner rewrite aims for.
const PLANNER_TARGET_RATIO: f64 = 0.6;
/// Overshooting rewrites are cut to this share of the target, in words.
const OVERSHOOT_WORD_RATIO: f64 = 0.7;
/// Share of the window reserved for the rolling summary and system
/// overhead during segmented processing.
const SEGMENT_RESERVED_RATIO: f64 = 0.5;

/// One record of the segmented-processing stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentRecord {
    /// A segment ready for the consumer. `history_summary` is the rolling
    /// summary accumulated *before* this segment.
    Segment {
        index: usize,
        total: usize,
        content: String,
        history_summary: String,
        has_history: bool,
        summary: String,
    },
    /// Emitted once after the last segment.
    FinalSummary {
        summary: String,
        total_segments: usize,
    },
}

/// Configuration knobs for the compression service.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub word_boundary: usize,
    pub segment_target_tokens: usize,
    pub summary_context_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            word_boundary: 100,
            segment_target_tokens: 2000,
            summary_context_size: 500,
        }
    }
}

/// Compression service.
pub struct CompressionService {
    llm: Arc<dyn LlmClient>,
    config: CompressionConfig,
}

impl CompressionService {
    pub fn new(llm: Arc<dyn LlmClient>, config: CompressionConfig) -> Self {
        Self { llm, config }
    }

    /// Segment `content` with the configured overlap.
    pub fn segment(&self, content: &str, target_tokens: usize) -> Vec<agentflow_models::ContentSegment> {
        segment_content(content, target_tokens, self.config.word_boundary)
    }

    /// Compress content in one pass, dispatching on `(role, kind)`.
    pub async fn compress_for_immediate_use(
        &self,
        content: &str,
        kind: CompressionKind,
        context: &str,
        token_info: TokenInfo,
        role: AgentRole,
    ) -> CompressionResult {
        match (role, kind) {
            (AgentRole::Planner, CompressionKind::UserInput) => {
                self.compress_user_input_for_planner(content, token_info).await
            }
            (AgentRole::Executor, CompressionKind::ToolOutput) => {
                self.compress_tool_output_for_executor(content, context, token_info)
                    .await
            }
            _ => self.compress_content_general(content, kind, context, token_info).await,
        }
    }

    /// Rewrite an oversized user input for the planner.
    async fn compress_user_input_for_planner(
        &self,
        content: &str,
        token_info: TokenInfo,
    ) -> CompressionResult {
        let original_tokens = estimate_tokens(content);
        let available = token_info
            .max_tokens
            .saturating_sub(PLANNER_RESERVED_TOKENS);
        let target_tokens =
            ((available as f64 * PLANNER_TARGET_RATIO) as usize).max(PLANNER_MIN_TARGET);

        if original_tokens <= target_tokens {
            let mut result =
                CompressionResult::unchanged(content, CompressionKind::UserInput, original_tokens);
            result.preserved_intent = Some(content.to_string());
            return result;
        }

        let overshoot_words = (target_tokens as f64 * OVERSHOOT_WORD_RATIO) as usize;
        let prompt = render(
            PLANNER_COMPRESSION_PROMPT,
            &[
                ("user_content", &truncate_chars(content, target_tokens * 3)),
                ("target_tokens", &target_tokens.to_string()),
            ],
        );

        let compressed = match self.ask_text(prompt).await {
            Some(rewritten) => {
                let rewritten_tokens = estimate_tokens(&rewritten);
                if rewritten_tokens > target_tokens {
                    truncate_words(&rewritten, overshoot_words)
                } else if rewritten_tokens < target_tokens / 10 {
                    // The model under-produced; keep the head of the
                    // original instead of a lossy stub.
                    truncate_words(content, overshoot_words)
                } else {
                    rewritten
                }
            }
            None => truncate_words(content, overshoot_words),
        };

        let compressed_tokens = estimate_tokens(&compressed);
        CompressionResult {
            original_content: content.to_string(),
            compressed_content: compressed.clone(),
            kind: CompressionKind::UserInput,
            original_token_count: original_tokens,
            compressed_token_count: compressed_tokens,
            preserved_intent: Some(compressed),
            summary: None,
            segments_processed: Vec::new(),
        }
    }

    /// Summarize a tool output through the lens of the current step.
    async fn compress_tool_output_for_executor(
        &self,
        content: &str,
        context: &str,
        token_info: TokenInfo,
    ) -> CompressionResult {
        let original_tokens = estimate_tokens(content);
        let target_tokens = token_info.max_tokens / 4;

        let prompt = render(
            TOOL_OUTPUT_SUMMARY_PROMPT,
            &[
                ("step_description", context),
                ("tool_output", &truncate_chars(content, target_tokens * 3)),
            ],
        );

        match self.ask_text(prompt).await {
            Some(summary) => {
                let compressed = format!("[工具执行结果摘要 - 步骤: {context}]:\n{summary}");
                CompressionResult {
                    original_content: content.to_string(),
                    compressed_token_count: estimate_tokens(&compressed),
                    compressed_content: compressed,
                    kind: CompressionKind::ToolOutput,
                    original_token_count: original_tokens,
                    preserved_intent: None,
                    summary: Some(summary),
                    segments_processed: Vec::new(),
                }
            }
            None => {
                let truncated = format!("{}...", truncate_chars(content, target_tokens * 2));
                let compressed = format!("[工具输出截断 - 步骤: {context}]:\n{truncated}");
                CompressionResult {
                    original_content: content.to_string(),
                    compressed_token_count: estimate_tokens(&compressed),
                    compressed_content: compressed,
                    kind: CompressionKind::ToolOutput,
                    original_token_count: original_tokens,
                    preserved_intent: None,
                    summary: None,
                    segments_processed: Vec::new(),
                }
            }
        }
    }

    /// Generic compression: extract the user's intent for user content,
    /// summarize everything else under a content-type label. Also the
    /// strategy for content that fits neither role-specific path, such as
    /// the model's own assistant turns.
    pub async fn compress_content_general(
        &self,
        content: &str,
        kind: CompressionKind,
        context: &str,
        token_info: TokenInfo,
    ) -> CompressionResult {
        let original_tokens = estimate_tokens(content);
        let available =
            token_info.available_tokens().saturating_add(original_tokens);
        let target_tokens = available
            .saturating_sub(500)
            .max(token_info.max_tokens / 4);

        let (prefix, intent) = if matches!(kind, CompressionKind::UserInput) {
            let intent = self.extract_user_intent(content).await;
            (format!("[用户意图]: {intent}\n\n[内容摘要]: "), Some(intent))
        } else {
            (
                format!("[{}内容摘要 - {context}]: ", kind_label(kind)),
                None,
            )
        };

        let summary = self
            .summarize_content(&truncate_chars(content, target_tokens * 3), context)
            .await;
        let compressed = format!("{prefix}{summary}");

        CompressionResult {
            original_content: content.to_string(),
            compressed_token_count: estimate_tokens(&compressed),
            compressed_content: compressed,
            kind,
            original_token_count: original_tokens,
            preserved_intent: intent,
            summary: Some(summary),
            segments_processed: Vec::new(),
        }
    }

    /// Process content too large even for single-pass compression.
    ///
    /// Reserves half the window for the rolling summary and system
    /// overhead, segments the rest, and yields one record per segment
    /// followed by a final-summary record. The consumer turns each
    /// segment record into an LLM call of its own.
    pub fn process_long_content_in_segments<'a>(
        &'a self,
        content: &'a str,
        context: &'a str,
        max_tokens: usize,
    ) -> impl Stream<Item = SegmentRecord> + Send + 'a {
        async_stream::stream! {
            let reserved = (max_tokens as f64 * SEGMENT_RESERVED_RATIO) as usize;
            let segment_size = if max_tokens > reserved {
                max_tokens - reserved
            } else {
                self.config.segment_target_tokens
            };
            let segments = self.segment(content, segment_size);
            let total = segments.len();
            if total == 0 {
                return;
            }
            tracing::info!(segments = total, segment_size, "Processing long content in segments");

            let mut accumulated = String::new();
            for segment in segments {
                let has_history = !accumulated.is_empty();
                let history_summary = accumulated.clone();

                let summary = self
                    .summarize_segment(&segment.content, context, &accumulated, segment.index + 1, total)
                    .await;

                accumulated = if has_history {
                    self.combine_summaries(&accumulated, &summary).await
                } else {
                    summary.clone()
                };

                yield SegmentRecord::Segment {
                    index: segment.index,
                    total,
                    content: segment.content,
                    history_summary,
                    has_history,
                    summary,
                };
            }

            yield SegmentRecord::FinalSummary {
                summary: accumulated,
                total_segments: total,
            };
        }
    }

    async fn summarize_segment(
        &self,
        segment_content: &str,
        context: &str,
        previous_summary: &str,
        segment_index: usize,
        total_segments: usize,
    ) -> String {
        let prompt = render(
            SEGMENT_SUMMARY_PROMPT,
            &[
                ("context", context),
                (
                    "previous_summary",
                    if previous_summary.is_empty() { "无" } else { previous_summary },
                ),
                ("segment_index", &segment_index.to_string()),
                ("total_segments", &total_segments.to_string()),
                ("segment_content", segment_content),
            ],
        );

        match self.ask_text(prompt).await {
            Some(summary) => summary,
            None => format!("{}...", truncate_chars(segment_content, 200)),
        }
    }

    /// Merge two summaries, keeping the result inside the summary budget.
    async fn combine_summaries(&self, previous: &str, new: &str) -> String {
        let combined = format!("{previous}\n\n{new}");
        if estimate_tokens(&combined) <= self.config.summary_context_size {
            return combined;
        }

        let prompt = render(
            COMBINE_SUMMARIES_PROMPT,
            &[
                ("previous_summary", previous),
                ("new_summary", new),
                ("target_tokens", &self.config.summary_context_size.to_string()),
            ],
        );

        match self.ask_text(prompt).await {
            Some(merged) => merged,
            None => truncate_chars(&combined, self.config.summary_context_size),
        }
    }

    async fn extract_user_intent(&self, user_input: &str) -> String {
        let prompt = render(
            USER_INTENT_PROMPT,
            &[("user_input", &truncate_chars(user_input, 1000))],
        );
        match self.ask_text(prompt).await {
            Some(intent) => intent,
            None => truncate_chars(user_input, 500),
        }
    }

    async fn summarize_content(&self, content: &str, context: &str) -> String {
        let prompt = render(
            CONTENT_SUMMARY_PROMPT,
            &[
                ("context", if context.is_empty() { "无特定上下文" } else { context }),
                ("content", content),
            ],
        );
        match self.ask_text(prompt).await {
            Some(summary) => summary,
            None => format!("{}...", truncate_chars(content, 200)),
        }
    }

    /// One helper ask; any failure or overflow is treated as "no result"
    /// so callers fall back to truncation.
    async fn ask_text(&self, prompt: String) -> Option<String> {
        match self.llm.ask(&[Message::user(prompt)], &[], None).await {
            Ok(AskOutcome::Answer(message)) if !message.content().trim().is_empty() => {
                Some(message.content().to_string())
            }
            Ok(AskOutcome::Answer(_)) | Ok(AskOutcome::TokenLimit(_)) => None,
            Err(error) => {
                tracing::warn!(%error, "Compression ask failed, using textual fallback");
                None
            }
        }
    }
}

/// Content-type word interpolated into the general summary prefix.
fn kind_label(kind: CompressionKind) -> &'static str {
    match kind {
        CompressionKind::UserInput => "user",
        CompressionKind::ToolOutput => "tool",
        CompressionKind::MemoryCleanup => "memory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockStep};
    use futures::StreamExt;
    use futures::pin_mut;

    fn service_with(steps: Vec<MockStep>) -> CompressionService {
        CompressionService::new(
            Arc::new(MockLlmClient::from_steps("mock", steps)),
            CompressionConfig::default(),
        )
    }

    fn long_words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn planner_short_input_is_unchanged() {
        let service = service_with(vec![]);
        let result = service
            .compress_for_immediate_use(
                "短请求",
                CompressionKind::UserInput,
                "",
                TokenInfo::new(9000, 8192),
                AgentRole::Planner,
            )
            .await;
        assert_eq!(result.compressed_content, "短请求");
        assert_eq!(result.token_saved(), 0);
        assert_eq!(result.preserved_intent.as_deref(), Some("短请求"));
    }

    #[tokio::test]
    async fn planner_rewrite_used_when_within_target() {
        // target = max(0.6 * (8192 - 4000), 500) = 2515
        let service = service_with(vec![MockStep::text(long_words(400))]);
        let content = long_words(5000);
        let result = service
            .compress_for_immediate_use(
                &content,
                CompressionKind::UserInput,
                "",
                TokenInfo::new(12000, 8192),
                AgentRole::Planner,
            )
            .await;
        assert_eq!(result.compressed_content, long_words(400));
        assert!(result.token_saved() > 0);
        assert!(result.compressed_token_count < result.original_token_count);
    }

    #[tokio::test]
    async fn planner_overshoot_is_word_truncated() {
        // Rewrite far above target gets cut to 0.7 * target words.
        let service = service_with(vec![MockStep::text(long_words(6000))]);
        let content = long_words(5000);
        let result = service
            .compress_for_immediate_use(
                &content,
                CompressionKind::UserInput,
                "",
                TokenInfo::new(12000, 8192),
                AgentRole::Planner,
            )
            .await;
        let words = result.compressed_content.split_whitespace().count();
        assert_eq!(words, (2515.0 * 0.7) as usize);
    }

    #[tokio::test]
    async fn planner_underproduction_falls_back_to_original_head() {
        // Fewer than target/10 tokens produced: keep the original's head.
        let service = service_with(vec![MockStep::text("太短")]);
        let content = long_words(5000);
        let result = service
            .compress_for_immediate_use(
                &content,
                CompressionKind::UserInput,
                "",
                TokenInfo::new(12000, 8192),
                AgentRole::Planner,
            )
            .await;
        assert!(result.compressed_content.starts_with("word0 word1"));
        let words = result.compressed_content.split_whitespace().count();
        assert_eq!(words, (2515.0 * 0.7) as usize);
    }

    #[tokio::test]
    async fn planner_llm_failure_falls_back_to_truncation() {
        let service = service_with(vec![MockStep::error("llm down")]);
        let content = long_words(5000);
        let result = service
            .compress_for_immediate_use(
                &content,
                CompressionKind::UserInput,
                "",
                TokenInfo::new(12000, 8192),
                AgentRole::Planner,
            )
            .await;
        assert!(result.compressed_content.starts_with("word0 word1"));
        assert!(result.compressed_token_count < result.original_token_count);
    }

    #[tokio::test]
    async fn executor_tool_output_is_wrapped_summary() {
        let service = service_with(vec![MockStep::text("找到了三个匹配文件")]);
        let result = service
            .compress_for_immediate_use(
                &long_words(4000),
                CompressionKind::ToolOutput,
                "搜索项目文件",
                TokenInfo::new(9000, 8192),
                AgentRole::Executor,
            )
            .await;
        assert_eq!(
            result.compressed_content,
            "[工具执行结果摘要 - 步骤: 搜索项目文件]:\n找到了三个匹配文件"
        );
        assert_eq!(result.summary.as_deref(), Some("找到了三个匹配文件"));
    }

    #[tokio::test]
    async fn executor_tool_output_failure_wraps_truncation() {
        let service = service_with(vec![MockStep::error("llm down")]);
        let result = service
            .compress_for_immediate_use(
                &long_words(4000),
                CompressionKind::ToolOutput,
                "搜索项目文件",
                TokenInfo::new(9000, 8192),
                AgentRole::Executor,
            )
            .await;
        assert!(result
            .compressed_content
            .starts_with("[工具输出截断 - 步骤: 搜索项目文件]:"));
        assert!(result.summary.is_none());
    }

    #[tokio::test]
    async fn general_compression_extracts_intent_and_summary() {
        let service = service_with(vec![
            MockStep::text("整理季度数据"),
            MockStep::text("内容主要是销售记录"),
        ]);
        let result = service
            .compress_for_immediate_use(
                &long_words(4000),
                CompressionKind::UserInput,
                "当前任务",
                TokenInfo::new(9000, 8192),
                AgentRole::Executor,
            )
            .await;
        assert_eq!(
            result.compressed_content,
            "[用户意图]: 整理季度数据\n\n[内容摘要]: 内容主要是销售记录"
        );
        assert_eq!(result.preserved_intent.as_deref(), Some("整理季度数据"));
    }

    #[tokio::test]
    async fn general_compression_labels_non_user_content() {
        // Planner + tool output has no dedicated strategy; the general
        // path labels the summary with the content type.
        let service = service_with(vec![MockStep::text("输出要点")]);
        let result = service
            .compress_for_immediate_use(
                &long_words(4000),
                CompressionKind::ToolOutput,
                "当前任务",
                TokenInfo::new(9000, 8192),
                AgentRole::Planner,
            )
            .await;
        assert_eq!(
            result.compressed_content,
            "[tool内容摘要 - 当前任务]: 输出要点"
        );
        assert!(result.preserved_intent.is_none());
        assert_eq!(result.summary.as_deref(), Some("输出要点"));
    }

    #[tokio::test]
    async fn general_compression_labels_memory_content() {
        let service = service_with(vec![MockStep::text("历史要点")]);
        let result = service
            .compress_content_general(
                &long_words(4000),
                CompressionKind::MemoryCleanup,
                "当前任务",
                TokenInfo::new(9000, 8192),
            )
            .await;
        assert_eq!(
            result.compressed_content,
            "[memory内容摘要 - 当前任务]: 历史要点"
        );
        assert!(result.preserved_intent.is_none());
    }

    #[tokio::test]
    async fn segmented_stream_yields_segments_then_final_summary() {
        // Enough scripted summaries for every segment; combine calls only
        // happen when the accumulated summary overflows its budget.
        let steps = (0..40).map(|i| MockStep::text(format!("段摘要{i}"))).collect();
        let service = service_with(steps);
        let content = long_words(20_000);

        let stream = service.process_long_content_in_segments(&content, "任务", 8192);
        pin_mut!(stream);

        let mut segment_count = 0usize;
        let mut saw_final = false;
        let mut first_history: Option<(bool, String)> = None;
        while let Some(record) = stream.next().await {
            match record {
                SegmentRecord::Segment {
                    index,
                    total,
                    has_history,
                    history_summary,
                    ..
                } => {
                    assert_eq!(index, segment_count);
                    assert!(total >= 2, "content this size should split");
                    if first_history.is_none() {
                        first_history = Some((has_history, history_summary));
                    }
                    segment_count += 1;
                }
                SegmentRecord::FinalSummary { total_segments, summary } => {
                    saw_final = true;
                    assert_eq!(total_segments, segment_count);
                    assert!(!summary.is_empty());
                }
            }
        }

        assert!(segment_count >= 2);
        assert!(saw_final);
        let (first_has_history, first_summary) = first_history.unwrap();
        assert!(!first_has_history);
        assert!(first_summary.is_empty());
    }

    #[tokio::test]
    async fn segmented_stream_empty_content_yields_nothing() {
        let service = service_with(vec![]);
        let stream = service.process_long_content_in_segments("", "任务", 8192);
        pin_mut!(stream);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn rolling_summary_respects_budget_via_merge() {
        // First segment summary is huge, so the second segment forces a
        // merge; the scripted merge result must become the accumulator.
        let big_summary = long_words(600);
        let steps = vec![
            MockStep::text(big_summary),       // segment 1 summary
            MockStep::text(long_words(600)),   // segment 2 summary
            MockStep::text("合并后的摘要"),    // merge call
        ];
        let service = service_with(steps);
        // Sized to split into exactly two segments at an 8192 window
        // (segment budget 4096 tokens).
        let content = long_words(1500);

        let stream = service.process_long_content_in_segments(&content, "任务", 8192);
        pin_mut!(stream);

        let mut final_summary = None;
        while let Some(record) = stream.next().await {
            if let SegmentRecord::FinalSummary { summary, .. } = record {
                final_summary = Some(summary);
            }
        }
        assert_eq!(final_summary.as_deref(), Some("合并后的摘要"));
    }
}
