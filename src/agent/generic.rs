//! Generic agent: the fallback when no specialised type matches.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, render_details, truncate_chars};
use super::sub_agent::{SubTaskOutcome, execute_sub_task};
use crate::error::AgentError;
use crate::llm::GenerateRequest;

#[derive(Debug, Default)]
pub struct GenericAgent;

impl GenericAgent {
    async fn plan(&self, ctx: &AgentContext, rendered: &str) {
        let Some(llm) = &ctx.llm else {
            return;
        };
        let request = GenerateRequest::new(format!(
            "Based on the task '{rendered}', create a simple step-by-step plan."
        ))
        .with_max_tokens(100);

        match llm.generate_text(request).await {
            Ok(plan) => {
                debug!(agent_id = %ctx.agent_id, plan = %truncate_chars(&plan, 100), "Generated plan");
                let key = format!("{}_plan", ctx.agent_id);
                if let Err(e) = ctx.memory.store(&key, Value::String(plan), false).await {
                    warn!(agent_id = %ctx.agent_id, error = %e, "Failed to store plan");
                }
            }
            Err(e) => warn!(agent_id = %ctx.agent_id, error = %e, "Planning failed, continuing"),
        }
    }

    async fn check_dependency(&self, ctx: &AgentContext, details: &TaskDetails) {
        let Some(key) = details.get("depends_on_key").and_then(Value::as_str) else {
            return;
        };
        match ctx.memory.retrieve(key, true).await {
            Some(data) => debug!(
                agent_id = %ctx.agent_id,
                key,
                data = %truncate_chars(&data.to_string(), 100),
                "Retrieved prerequisite data"
            ),
            None => warn!(agent_id = %ctx.agent_id, key, "Prerequisite data not found"),
        }
    }

    /// Fan out `subtasks` concurrently when dynamic sub-agents are allowed.
    async fn spawn_sub_agents(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Option<Vec<SubTaskOutcome>> {
        if !ctx.config.allow_dynamic_sub_agents {
            return None;
        }
        let Some(subtasks) = details.get("subtasks").and_then(Value::as_array) else {
            info!(agent_id = %ctx.agent_id, "Sub-agent spawning enabled, no subtasks declared");
            return None;
        };

        let ids: Vec<String> = (0..subtasks.len())
            .map(|i| format!("{}-sub-{i}", ctx.agent_id))
            .collect();
        let outcomes = join_all(
            subtasks
                .iter()
                .zip(&ids)
                .map(|(input, id)| execute_sub_task(id, input)),
        )
        .await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            agent_id = %ctx.agent_id,
            total = outcomes.len(),
            failed,
            "Sub-tasks complete"
        );
        Some(outcomes)
    }
}

#[async_trait]
impl AgentBehavior for GenericAgent {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let rendered = render_details(details);
        debug!(agent_id = %ctx.agent_id, "Processing generic task");

        self.check_dependency(ctx, details).await;
        self.plan(ctx, &rendered).await;

        if let Some(outcomes) = self.spawn_sub_agents(ctx, details).await {
            let key = format!("{}_subtask_results", ctx.agent_id);
            let value = serde_json::to_value(&outcomes).map_err(crate::error::MemoryError::from)?;
            ctx.memory.store(&key, value, false).await?;
        }

        tokio::time::sleep(ctx.config.simulated_work()).await;

        Ok(format!(
            "Processed result for task: {}...",
            truncate_chars(&rendered, 50)
        ))
    }
}
