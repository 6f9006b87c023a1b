//! Completion handling for dispatched units.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::Controller;
use super::history::HistoryEntry;
use super::task::{Task, TaskStatus};
use crate::agent::{Agent, AgentState};
use crate::error::AgentError;

impl Controller {
    /// Record the outcome of one finished unit.
    ///
    /// The task and agent are handed over by the unit's watcher, so nothing is
    /// recovered by scanning the in-flight map.
    pub(crate) async fn complete_unit(
        &self,
        agent: Arc<Agent>,
        mut task: Task,
        joined: Result<Result<(), AgentError>, JoinError>,
    ) {
        let agent_id = agent.id().to_string();

        let Some(entry) = self.in_flight.lock().await.remove(&agent_id) else {
            warn!(agent_id = %agent_id, task_id = %task.id, "Completion for untracked unit ignored");
            return;
        };
        if entry.task_id != task.id {
            warn!(
                agent_id = %agent_id,
                tracked = %entry.task_id,
                completed = %task.id,
                "Completion task id mismatch"
            );
        }

        let status = match joined {
            Ok(Ok(())) => status_from_state(agent.state()),
            Ok(Err(AgentError::Cancelled)) => TaskStatus::Cancelled,
            Ok(Err(e)) => {
                warn!(agent_id = %agent_id, task_id = %task.id, error = %e, "Agent refused dispatched task");
                self.anomaly(&agent, e.to_string())
            }
            Err(e) if e.is_cancelled() => TaskStatus::Cancelled,
            Err(e) => {
                warn!(agent_id = %agent_id, task_id = %task.id, error = %e, "Unit panicked");
                self.anomaly(&agent, format!("unit panicked: {e}"))
            }
        };

        if let Err(e) = task.transition_to(status) {
            debug!(error = %e, "Task status not updated");
        }

        let mut permanently_failed = false;
        let mut retry_task_id = None;
        if status == TaskStatus::Error {
            if task.retry_count < self.config.max_task_retries {
                let next = task.retry_count + 1;
                retry_task_id = Some(self.queue.enqueue_retry(task.details.clone(), next).await);
                info!(
                    task_id = %task.id,
                    retry_count = next,
                    max_retries = self.config.max_task_retries,
                    "Retrying failed task"
                );
            } else {
                permanently_failed = true;
                error!(
                    task_id = %task.id,
                    agent_id = %agent_id,
                    retry_count = task.retry_count,
                    "Task permanently failed"
                );
            }
        } else {
            info!(task_id = %task.id, agent_id = %agent_id, status = %status, "Unit completed");
        }

        let (result, error) = match status {
            TaskStatus::Completed => (agent.last_result(), None),
            TaskStatus::Error => (None, agent.last_error()),
            _ => (None, None),
        };

        self.history
            .push(HistoryEntry {
                task_id: task.id,
                details: task.details,
                status,
                retry_count: task.retry_count,
                agent_id: agent_id.clone(),
                agent_type: agent.agent_type().to_string(),
                result,
                error,
                finished_at: Utc::now(),
                permanently_failed,
                retry_task_id,
            })
            .await;

        // During shutdown the coordinator owns the registry.
        if !self.shutting_down.load(Ordering::SeqCst) {
            self.discard_agent(&agent).await;
        }
    }

    /// Anomalous unit exit: record it as an agent error unless the agent
    /// was stopped, which means the unit lost a race with shutdown.
    fn anomaly(&self, agent: &Agent, message: String) -> TaskStatus {
        if agent.state() == AgentState::Stopped {
            return TaskStatus::Cancelled;
        }
        agent.mark_error(message);
        TaskStatus::Error
    }

    async fn discard_agent(&self, agent: &Agent) {
        if agent.holds_resources()
            && let Err(e) = agent.release().await
        {
            warn!(agent_id = %agent.id(), error = %e, "Agent resource release failed");
        }
        if self.registry.remove(agent.id()).await.is_some() {
            debug!(agent_id = %agent.id(), "Agent discarded");
        }
    }
}

fn status_from_state(state: AgentState) -> TaskStatus {
    match state {
        AgentState::Finished => TaskStatus::Completed,
        AgentState::Cancelled | AgentState::Stopped => TaskStatus::Cancelled,
        // Idle or Running after a clean return should not happen.
        AgentState::Error | AgentState::Idle | AgentState::Running => TaskStatus::Error,
    }
}
