//! Pending task queue.
//!
//! Fresh work is FIFO. Retries jump to the head, so a burst of retries is
//! served newest-first among themselves.

use std::collections::VecDeque;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::task::Task;
use crate::agent::TaskDetails;
use crate::agent::behavior::{render_details, truncate_chars};

#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: RwLock<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append fresh work at the tail.
    pub async fn enqueue(&self, details: TaskDetails) -> Uuid {
        let task = Task::new(details, 0);
        let id = task.id;
        info!(
            task_id = %id,
            details = %truncate_chars(&render_details(&task.details), 100),
            "Task assigned"
        );
        self.tasks.write().await.push_back(task);
        id
    }

    /// Insert a retry at the head with a fresh identity.
    pub async fn enqueue_retry(&self, details: TaskDetails, retry_count: u32) -> Uuid {
        let task = Task::new(details, retry_count);
        let id = task.id;
        info!(task_id = %id, retry_count, "Task re-queued for retry");
        self.tasks.write().await.push_front(task);
        id
    }

    /// Put a dequeued task back at the head, keeping its identity.
    pub(crate) async fn requeue_front(&self, task: Task) {
        debug!(task_id = %task.id, "Task returned to queue head");
        self.tasks.write().await.push_front(task);
    }

    /// Put a dequeued task back at the tail, keeping its identity.
    pub(crate) async fn requeue_back(&self, task: Task) {
        debug!(task_id = %task.id, "Task returned to queue tail");
        self.tasks.write().await.push_back(task);
    }

    /// Take the head task, if any. Never blocks waiting for work.
    pub async fn dequeue(&self) -> Option<Task> {
        self.tasks.write().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Ordered copy of the pending tasks.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.tasks.read().await.iter().cloned().collect()
    }

    /// Drop all pending tasks, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let n = tasks.len();
        tasks.clear();
        n
    }
}
