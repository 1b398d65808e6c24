//! Events streamed by the agent engine

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::Step;

/// Event produced by the engine while driving a turn.
///
/// Within one session events are emitted in the order they are produced;
/// the last event of a successful `execute` is exactly one of `Message`
/// or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A tool invocation is about to run.
    ToolCalling {
        call_id: String,
        toolkit: String,
        function_name: String,
        arguments: Value,
    },
    /// A tool invocation finished; `result` is the tool-message content
    /// fed back to the model (post-compression when it was oversized).
    ToolCalled {
        call_id: String,
        toolkit: String,
        function_name: String,
        arguments: Value,
        result: String,
        success: bool,
    },
    /// Terminal assistant answer for the turn.
    Message { content: String },
    /// Terminal failure reason for the turn.
    Error { error: String },
    /// A plan step started executing.
    StepStarted { step: Step },
    /// A plan step finished.
    StepCompleted { step: Step },
    /// A plan step failed.
    StepFailed { step: Step },
}

impl AgentEvent {
    /// Whether this event ends a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Message { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_type_tag() {
        let event = AgentEvent::ToolCalling {
            call_id: "c1".into(),
            toolkit: "shell".into(),
            function_name: "shell_exec".into(),
            arguments: json!({"command": "ls"}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_calling");
        assert_eq!(value["function_name"], "shell_exec");
    }

    #[test]
    fn terminal_classification() {
        assert!(AgentEvent::Message { content: "done".into() }.is_terminal());
        assert!(AgentEvent::Error { error: "nope".into() }.is_terminal());
        assert!(!AgentEvent::StepStarted { step: Step::new("1", "collect") }.is_terminal());
    }
}
