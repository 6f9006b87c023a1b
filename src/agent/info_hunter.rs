//! Information-gathering agent.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, detail_str};
use crate::error::AgentError;
use crate::llm::GenerateRequest;

/// Raw results passed to synthesis.
const MAX_SYNTHESIS_INPUTS: usize = 5;

#[derive(Debug, Default)]
pub struct InfoHunterAgent;

impl InfoHunterAgent {
    async fn search_plan(&self, ctx: &AgentContext, query: &str) -> Option<String> {
        let Some(llm) = &ctx.llm else {
            warn!(agent_id = %ctx.agent_id, "No model available for planning");
            return None;
        };
        let request = GenerateRequest::new(format!(
            "Create a concise search plan to find information about: '{query}'. \
             Specify keywords, potential websites (if applicable), and types of information to look for."
        ))
        .with_system_prompt("You are a research planning assistant.")
        .with_max_tokens(150);

        match llm.generate_text(request).await {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(agent_id = %ctx.agent_id, error = %e, "Search planning failed");
                None
            }
        }
    }

    async fn gather(&self, ctx: &AgentContext, query: &str) -> Vec<String> {
        tokio::time::sleep(ctx.config.simulated_work()).await;
        vec![
            format!("Simulated result 1 for '{query}'"),
            "Simulated result 2 mentioning related topic".to_string(),
        ]
    }

    async fn synthesize(
        &self,
        ctx: &AgentContext,
        query: &str,
        results: &[String],
    ) -> Result<String, AgentError> {
        let Some(llm) = &ctx.llm else {
            return Ok(format!(
                "Synthesis skipped (model unavailable). Raw results:\n{}",
                results.join("\n")
            ));
        };

        let mut prompt = format!(
            "Synthesize the following information found regarding the query '{query}' into a concise report:\n\nRAW DATA:\n{}",
            results
                .iter()
                .take(MAX_SYNTHESIS_INPUTS)
                .cloned()
                .collect::<Vec<_>>()
                .join("\n---\n")
        );
        if results.len() > MAX_SYNTHESIS_INPUTS {
            prompt.push_str("\n... (more results truncated)");
        }
        prompt.push_str("\n\nSYNTHESIZED REPORT:");

        let request = GenerateRequest::new(prompt)
            .with_system_prompt("You are a research synthesis assistant.")
            .with_max_tokens(500);
        Ok(llm.generate_text(request).await?)
    }
}

#[async_trait]
impl AgentBehavior for InfoHunterAgent {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let query = detail_str(details, "description")
            .or_else(|| detail_str(details, "query"))
            .ok_or_else(|| AgentError::InvalidTask("missing query or description".into()))?;

        info!(agent_id = %ctx.agent_id, query, "Starting information hunt");

        if let Some(plan) = self.search_plan(ctx, query).await {
            debug!(agent_id = %ctx.agent_id, plan = %plan, "Search plan");
        }

        let results = self.gather(ctx, query).await;
        info!(agent_id = %ctx.agent_id, count = results.len(), "Gathered raw results");

        let report = self.synthesize(ctx, query, &results).await?;
        info!(agent_id = %ctx.agent_id, len = report.len(), "Synthesized report");
        Ok(report)
    }
}
