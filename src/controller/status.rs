//! Status snapshots for external observers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::Controller;
use super::history::HistoryEntry;
use super::task::Task;
use crate::agent::AgentInfo;

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub task_queue_size: usize,
    pub pending_tasks: Vec<Task>,
    pub active_agents: BTreeMap<String, AgentInfo>,
    pub active_agent_count: usize,
    pub max_concurrent_agents: usize,
    pub completed_tasks_history: Vec<HistoryEntry>,
}

impl Controller {
    pub async fn snapshot(&self) -> StatusSnapshot {
        let pending_tasks = self.queue.snapshot().await;
        let active_agents = self.registry.snapshot().await;
        StatusSnapshot {
            timestamp: Utc::now(),
            task_queue_size: pending_tasks.len(),
            pending_tasks,
            active_agent_count: active_agents.len(),
            active_agents,
            max_concurrent_agents: self.registry.max(),
            completed_tasks_history: self.history.snapshot().await,
        }
    }

    /// Store the current snapshot in the short-term cache.
    pub async fn publish_status(&self) {
        let snapshot = self.snapshot().await;
        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize status");
                return;
            }
        };
        match self.memory.store(&self.config.status_key, value, false).await {
            Ok(()) => debug!(
                queue = snapshot.task_queue_size,
                agents = snapshot.active_agent_count,
                "Status published"
            ),
            Err(e) => warn!(error = %e, "Failed to publish status"),
        }
    }

    /// Remove the published status so no stale document stays visible.
    pub(crate) async fn clear_status(&self) {
        if self.memory.delete(&self.config.status_key).await {
            debug!(key = %self.config.status_key, "Status cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::{AgentsConfig, ControllerConfig};
    use crate::controller::{AgentDeps, AgentRouter, Controller};
    use crate::memory::MemoryStore;

    fn controller() -> Arc<Controller> {
        let router = AgentRouter::new(AgentDeps {
            llm: None,
            memory: Arc::new(MemoryStore::short_term_only()),
            config: Arc::new(AgentsConfig::default()),
        });
        Controller::new(ControllerConfig::default(), router)
    }

    #[tokio::test]
    async fn snapshot_reflects_queue() {
        let c = controller();
        c.assign_task(json!({"description": "a"}).as_object().cloned().unwrap())
            .await;
        let snap = c.snapshot().await;
        assert_eq!(snap.task_queue_size, 1);
        assert_eq!(snap.pending_tasks.len(), 1);
        assert_eq!(snap.active_agent_count, 0);
        assert_eq!(snap.max_concurrent_agents, 5);
    }

    #[tokio::test]
    async fn publish_then_clear() {
        let c = controller();
        c.publish_status().await;

        let stored = c
            .memory()
            .retrieve("tac_controller_status", false)
            .await
            .unwrap();
        assert_eq!(stored["task_queue_size"], 0);
        assert!(stored["timestamp"].as_str().is_some());
        assert!(stored["active_agents"].as_object().unwrap().is_empty());

        c.clear_status().await;
        assert!(c.memory().retrieve("tac_controller_status", false).await.is_none());
    }
}
