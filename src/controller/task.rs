//! Task records and their status machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::TaskDetails;

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Pending,
    /// Handed to an agent.
    Running,
    /// Agent produced a result.
    Completed,
    /// Agent failed.
    Error,
    /// Cancelled mid-flight.
    Cancelled,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Running) | (Running, Completed) | (Running, Error) | (Running, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A queued unit of work.
///
/// A retry is a new `Task` with a fresh id and the same details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "task_id")]
    pub id: Uuid,
    pub details: TaskDetails,
    pub status: TaskStatus,
    pub retry_count: u32,
}

impl Task {
    pub fn new(details: TaskDetails, retry_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            details,
            status: TaskStatus::Pending,
            retry_count,
        }
    }

    /// Explicit type hint, if the caller gave one.
    pub fn type_hint(&self) -> Option<&str> {
        self.details.get("agent_type").and_then(|v| v.as_str())
    }

    pub fn transition_to(&mut self, target: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition task {} from {} to {}",
                self.id, self.status, target
            ));
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details() -> TaskDetails {
        json!({"description": "x", "agent_type": "browser"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn only_forward_path_allowed() {
        let mut task = Task::new(details(), 0);
        assert!(task.transition_to(TaskStatus::Completed).is_err());
        task.transition_to(TaskStatus::Running).unwrap();
        task.transition_to(TaskStatus::Error).unwrap();
        assert!(task.status.is_terminal());
        assert!(task.transition_to(TaskStatus::Running).is_err());
        assert!(task.transition_to(TaskStatus::Pending).is_err());
    }

    #[test]
    fn new_tasks_get_distinct_ids() {
        let a = Task::new(details(), 0);
        let b = Task::new(details(), 1);
        assert_ne!(a.id, b.id);
        assert_eq!(b.retry_count, 1);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.type_hint(), Some("browser"));
    }

    #[test]
    fn serializes_with_task_id_key() {
        let task = Task::new(details(), 0);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["task_id"], task.id.to_string());
        assert_eq!(value["status"], "pending");
    }
}
