//! AgentFlow Models - Shared model primitives
//!
//! Value types exchanged between the runtime, the persistence layer and
//! front-ends: conversation messages, agent memory, tool results, plans,
//! execution events and compression models.

pub mod compression;
pub mod event;
pub mod memory;
pub mod message;
pub mod plan;
pub mod tool;

pub use compression::{
    AgentRole, CompressionKind, CompressionResult, ContentSegment, TokenInfo,
};
pub use event::AgentEvent;
pub use memory::Memory;
pub use message::{Message, Role, ToolCall};
pub use plan::{ExecutionStatus, Plan, Step};
pub use tool::ToolResult;
