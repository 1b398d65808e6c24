//! AgentFlow Core - LLM agent runtime
//!
//! This crate provides:
//! - The agent iteration engine (tool-use loop with bounded retries and
//!   event streaming)
//! - Token-limit detection and the multi-strategy recovery ladder
//! - Memory compression: single-pass strategies and segmented processing
//!   with rolling history summaries
//! - Count-triggered memory cleanup preserving the system prompt and the
//!   original task
//! - Tool abstractions and the LLM client boundary

pub mod agent;
pub mod compression;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use agent::{AgentEngine, ExecutorAgent, PlannerAgent};
pub use compression::{CompressionService, SegmentRecord, segment_content};
pub use compression::service::CompressionConfig;
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use llm::{AskOutcome, LlmClient, MockLlmClient, MockStep, OpenAiClient, ResponseFormat};
pub use memory::{MemoryManager, estimate_tokens};
pub use tools::{RegisteredTool, Tool, ToolRegistry, ToolSchema, Toolkit};

// Model primitives used throughout the public surface
pub use agentflow_models::{
    AgentEvent, AgentRole, CompressionKind, CompressionResult, ContentSegment, ExecutionStatus,
    Memory, Message, Plan, Role, Step, TokenInfo, ToolCall, ToolResult,
};
pub use agentflow_storage::{InMemoryRepository, MemoryRepository, StorageError};
