//! Tool and toolkit traits

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentflow_models::ToolResult;

use crate::error::Result;

/// JSON Schema advertised to the LLM for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the arguments.
    pub parameters: Value,
}

/// Core trait for agent tools.
///
/// Each registration carries an explicit argument schema; the runtime
/// never inspects function signatures.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique function name (used in LLM tool calls)
    fn name(&self) -> &str;

    /// Human-readable description for LLM context
    fn description(&self) -> &str;

    /// JSON Schema for input parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given arguments
    async fn invoke(&self, args: Value) -> Result<ToolResult>;

    /// Build complete schema for the LLM
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Logical grouping of tools (shell, browser, message, ...).
///
/// The registry is built from toolkits; lookup stays flat by function
/// name, the toolkit name only travels in events and logs.
pub trait Toolkit: Send + Sync {
    /// Toolkit name reported in events
    fn name(&self) -> &str;

    /// Tools contributed by this toolkit
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}
