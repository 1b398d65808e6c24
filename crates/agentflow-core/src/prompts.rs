//! Prompt templates
//!
//! Templates live as markdown assets and use `{placeholder}` slots filled
//! by [`render`].

pub const PLANNER_SYSTEM_PROMPT: &str = include_str!("../assets/prompts/planner_system.md");
pub const EXECUTOR_SYSTEM_PROMPT: &str = include_str!("../assets/prompts/executor_system.md");
pub const CREATE_PLAN_PROMPT: &str = include_str!("../assets/prompts/create_plan.md");
pub const EXECUTION_STEP_PROMPT: &str = include_str!("../assets/prompts/execution_step.md");

pub const PLANNER_COMPRESSION_PROMPT: &str =
    include_str!("../assets/prompts/planner_compression.md");
pub const TOOL_OUTPUT_SUMMARY_PROMPT: &str =
    include_str!("../assets/prompts/tool_output_summary.md");
pub const CONTENT_SUMMARY_PROMPT: &str = include_str!("../assets/prompts/content_summary.md");
pub const USER_INTENT_PROMPT: &str = include_str!("../assets/prompts/user_intent.md");
pub const SEGMENT_SUMMARY_PROMPT: &str = include_str!("../assets/prompts/segment_summary.md");
pub const COMBINE_SUMMARIES_PROMPT: &str = include_str!("../assets/prompts/combine_summaries.md");

pub const EXECUTION_HISTORY_SUMMARY_PROMPT: &str =
    include_str!("../assets/prompts/execution_history_summary.md");
pub const GENERAL_HISTORY_SUMMARY_PROMPT: &str =
    include_str!("../assets/prompts/general_history_summary.md");

/// Fill `{name}` placeholders in a template.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut output = template.to_string();
    for (name, value) in vars {
        output = output.replace(&format!("{{{name}}}"), value);
    }
    output
}
