//! Plan and step models produced by the planner agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution status of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// One executable step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: ExecutionStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Structured plan emitted by the planner agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "generate_plan_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub goal: String,
    /// Reply to the user produced alongside the plan.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_plan_id() -> String {
    Uuid::new_v4().to_string()
}

impl Plan {
    /// A plan with no steps means the planner judged the task infeasible.
    pub fn is_feasible(&self) -> bool {
        !self.steps.is_empty()
    }

    /// The next step that has not completed, if any.
    pub fn next_pending_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| matches!(step.status, ExecutionStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_planner_json() {
        // Shape the create-plan prompt asks the model for.
        let raw = r#"{
            "message": "收到，我来安排",
            "goal": "整理报告",
            "title": "报告整理计划",
            "steps": [
                {"id": "1", "description": "收集数据"},
                {"id": "2", "description": "撰写总结"}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].status, ExecutionStatus::Pending);
        assert!(plan.is_feasible());
        assert!(!plan.id.is_empty());
    }

    #[test]
    fn empty_steps_is_infeasible() {
        let raw = r#"{"message": "无法完成", "goal": "", "title": "", "steps": []}"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert!(!plan.is_feasible());
        assert!(plan.next_pending_step().is_none());
    }

    #[test]
    fn next_pending_skips_finished_steps() {
        let mut plan: Plan =
            serde_json::from_str(r#"{"steps": [{"id":"1","description":"a"},{"id":"2","description":"b"}]}"#)
                .unwrap();
        plan.steps[0].status = ExecutionStatus::Completed;
        assert_eq!(plan.next_pending_step().unwrap().id, "2");
    }
}
