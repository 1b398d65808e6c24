//! Planner agent

use std::sync::Arc;

use agentflow_models::{AgentRole, Message, Plan};
use agentflow_storage::MemoryRepository;

use crate::agent::engine::AgentEngine;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::llm::{LlmClient, ResponseFormat};
use crate::prompts::{CREATE_PLAN_PROMPT, PLANNER_SYSTEM_PROMPT, render};
use crate::tools::ToolRegistry;
use crate::utils::json::extract_json;

/// Planner agent: turns a user message into a structured plan of steps.
pub struct PlannerAgent {
    engine: AgentEngine,
}

impl PlannerAgent {
    pub fn new(
        agent_id: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        let config = AgentConfig::new(agent_id, AgentRole::Planner)
            .with_system_prompt(PLANNER_SYSTEM_PROMPT);
        Self {
            engine: AgentEngine::new(config, llm, tools, repository),
        }
    }

    /// Build with a custom configuration (role is forced to planner).
    pub fn with_config(
        mut config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        config.role = AgentRole::Planner;
        Self {
            engine: AgentEngine::new(config, llm, tools, repository),
        }
    }

    /// Create a plan for the user message.
    ///
    /// One ask in JSON mode through the full recovery ladder; the reply
    /// is parsed leniently (markdown fences and surrounding prose are
    /// tolerated). A plan with no steps means the task was judged
    /// infeasible.
    pub async fn create_plan(&mut self, request: &str) -> Result<Plan> {
        let prompt = render(CREATE_PLAN_PROMPT, &[("user_message", request)]);
        let response = self
            .engine
            .ask_with_messages(vec![Message::user(prompt)], Some(ResponseFormat::JsonObject))
            .await?;

        let value = extract_json(response.content()).ok_or_else(|| {
            AgentError::InvalidFormat(format!(
                "plan response is not JSON: {}",
                crate::utils::text::truncate_chars(response.content(), 120)
            ))
        })?;
        let plan: Plan = serde_json::from_value(value)?;
        tracing::info!(steps = plan.steps.len(), title = %plan.title, "Plan created");
        Ok(plan)
    }

    /// The underlying engine, for rollback/compaction plumbing.
    pub fn engine_mut(&mut self) -> &mut AgentEngine {
        &mut self.engine
    }

    pub fn engine(&self) -> &AgentEngine {
        &self.engine
    }
}
