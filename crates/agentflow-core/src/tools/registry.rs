//! Tool registry built from toolkits

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::tools::traits::{Tool, ToolSchema, Toolkit};

/// A tool together with the toolkit it came from.
#[derive(Clone)]
pub struct RegisteredTool {
    pub toolkit: String,
    pub tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("toolkit", &self.toolkit)
            .field("tool", &self.tool.name())
            .finish()
    }
}

/// Registry for the tools available to one agent.
///
/// Read-only after construction; lookup is by flat function name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from toolkits
    pub fn from_toolkits(toolkits: &[&dyn Toolkit]) -> Self {
        let mut registry = Self::new();
        for toolkit in toolkits {
            registry.register_toolkit(*toolkit);
        }
        registry
    }

    /// Register every tool of a toolkit
    pub fn register_toolkit(&mut self, toolkit: &dyn Toolkit) {
        let toolkit_name = toolkit.name().to_string();
        for tool in toolkit.tools() {
            self.tools.insert(
                tool.name().to_string(),
                RegisteredTool {
                    toolkit: toolkit_name.clone(),
                    tool,
                },
            );
        }
    }

    /// Register a single standalone tool under a toolkit name
    pub fn register(&mut self, toolkit: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.insert(
            tool.name().to_string(),
            RegisteredTool {
                toolkit: toolkit.into(),
                tool,
            },
        );
    }

    /// Look up a tool by function name
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Look up a tool, producing a structured error for unknown names
    pub fn require(&self, name: &str) -> Result<&RegisteredTool> {
        self.get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All function names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Schemas for every registered tool
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|entry| entry.tool.schema())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_models::ToolResult;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input payload"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" }
                }
            })
        }

        async fn invoke(&self, args: Value) -> crate::error::Result<ToolResult> {
            Ok(ToolResult::success(args))
        }
    }

    struct TestToolkit;

    impl Toolkit for TestToolkit {
        fn name(&self) -> &str {
            "testing"
        }

        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            vec![Arc::new(EchoTool)]
        }
    }

    #[test]
    fn registry_from_toolkits() {
        let registry = ToolRegistry::from_toolkits(&[&TestToolkit]);
        assert!(registry.has("echo"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.get("echo").unwrap().toolkit, "testing");
    }

    #[test]
    fn unknown_name_is_structured_error() {
        let registry = ToolRegistry::new();
        let error = registry.require("missing").unwrap_err();
        assert!(matches!(error, AgentError::ToolNotFound(name) if name == "missing"));
    }

    #[test]
    fn schemas_cover_all_tools() {
        let registry = ToolRegistry::from_toolkits(&[&TestToolkit]);
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
        assert_eq!(schemas[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn registered_tool_is_invocable() {
        let registry = ToolRegistry::from_toolkits(&[&TestToolkit]);
        let entry = registry.require("echo").unwrap();
        let result = entry.tool.invoke(json!({"message": "hi"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["message"], "hi");
    }
}
