//! Executor agent

use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};

use agentflow_models::{AgentEvent, AgentRole, ExecutionStatus, Plan, Step};
use agentflow_storage::MemoryRepository;

use crate::agent::engine::AgentEngine;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::prompts::{EXECUTION_STEP_PROMPT, EXECUTOR_SYSTEM_PROMPT, render};
use crate::tools::ToolRegistry;

/// Executor agent: carries one plan step to completion per call.
pub struct ExecutorAgent {
    engine: AgentEngine,
}

impl ExecutorAgent {
    pub fn new(
        agent_id: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        let config = AgentConfig::new(agent_id, AgentRole::Executor)
            .with_system_prompt(EXECUTOR_SYSTEM_PROMPT);
        Self {
            engine: AgentEngine::new(config, llm, tools, repository),
        }
    }

    /// Build with a custom configuration (role is forced to executor).
    pub fn with_config(
        mut config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        config.role = AgentRole::Executor;
        Self {
            engine: AgentEngine::new(config, llm, tools, repository),
        }
    }

    /// Execute one plan step, bracketing the engine's events with step
    /// lifecycle events. The step is marked completed on the terminal
    /// message and failed on a terminal error.
    pub fn execute_step<'a>(
        &'a mut self,
        plan: &'a Plan,
        step: &'a mut Step,
    ) -> impl Stream<Item = Result<AgentEvent>> + Send + 'a {
        try_stream! {
            let request = render(
                EXECUTION_STEP_PROMPT,
                &[("goal", plan.goal.as_str()), ("step", step.description.as_str())],
            );

            step.status = ExecutionStatus::Running;
            yield AgentEvent::StepStarted { step: step.clone() };

            {
                let inner = self.engine.execute(request);
                pin_mut!(inner);
                while let Some(event) = inner.next().await {
                    let event = event?;
                    match &event {
                        AgentEvent::Error { error } => {
                            step.status = ExecutionStatus::Failed;
                            step.error = Some(error.clone());
                            yield AgentEvent::StepFailed { step: step.clone() };
                        }
                        AgentEvent::Message { content } => {
                            step.status = ExecutionStatus::Completed;
                            step.result = Some(content.clone());
                            yield AgentEvent::StepCompleted { step: step.clone() };
                        }
                        _ => {}
                    }
                    yield event;
                }
            }
        }
    }

    /// The underlying engine, for rollback/compaction plumbing.
    pub fn engine_mut(&mut self) -> &mut AgentEngine {
        &mut self.engine
    }

    pub fn engine(&self) -> &AgentEngine {
        &self.engine
    }
}
