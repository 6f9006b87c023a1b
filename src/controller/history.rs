//! Bounded ring of terminal task outcomes.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::task::TaskStatus;
use crate::agent::TaskDetails;

/// Outcome of one dispatched attempt.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub task_id: Uuid,
    pub details: TaskDetails,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub agent_id: String,
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
    /// Failed with the retry budget exhausted.
    pub permanently_failed: bool,
    /// Id of the retry this failure produced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_task_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct CompletionHistory {
    entries: RwLock<VecDeque<HistoryEntry>>,
    limit: usize,
}

impl CompletionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    /// Append, evicting the oldest entries beyond the limit.
    pub async fn push(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Oldest first.
    pub async fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(retry_count: u32) -> HistoryEntry {
        HistoryEntry {
            task_id: Uuid::new_v4(),
            details: TaskDetails::new(),
            status: TaskStatus::Completed,
            retry_count,
            agent_id: "generic-1".into(),
            agent_type: "generic".into(),
            result: Some("ok".into()),
            error: None,
            finished_at: Utc::now(),
            permanently_failed: false,
            retry_task_id: None,
        }
    }

    #[tokio::test]
    async fn evicts_oldest_first() {
        let history = CompletionHistory::new(3);
        for i in 0..5 {
            history.push(entry(i)).await;
        }
        let kept: Vec<u32> = history.snapshot().await.iter().map(|e| e.retry_count).collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn optional_fields_omitted() {
        let value = serde_json::to_value(entry(0)).unwrap();
        assert!(value.get("error").is_none());
        assert!(value.get("retry_task_id").is_none());
        assert_eq!(value["status"], "completed");
    }
}
