//! The single override point agent variants implement.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AgentsConfig;
use crate::error::AgentError;
use crate::llm::LlmProvider;
use crate::memory::MemoryStore;

/// Opaque task payload as submitted by the caller.
pub type TaskDetails = serde_json::Map<String, serde_json::Value>;

/// Collaborators an agent works with.
#[derive(Clone)]
pub struct AgentContext {
    pub agent_id: String,
    /// `None` when no model is configured.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub memory: Arc<MemoryStore>,
    pub config: Arc<AgentsConfig>,
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent_id", &self.agent_id)
            .field("llm", &self.llm.as_ref().map(|l| l.model_name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Type-specific task processing.
///
/// Lifecycle bookkeeping (state, reporting, cancellation) lives in
/// [`Agent`](super::Agent); implementations only turn details into a result.
#[async_trait]
pub trait AgentBehavior: Send + Sync {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError>;

    /// Whether [`release`](Self::release) must be awaited on shutdown.
    fn holds_resources(&self) -> bool {
        false
    }

    /// Release external resources such as a browser session.
    async fn release(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Non-empty string field of the task details.
pub fn detail_str<'a>(details: &'a TaskDetails, key: &str) -> Option<&'a str> {
    details
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Compact single-line rendering of task details for prompts and logs.
pub fn render_details(details: &TaskDetails) -> String {
    serde_json::to_string(details).unwrap_or_else(|_| format!("{details:?}"))
}
