//! Agent lifecycle wrapper.
//!
//! An [`Agent`] owns one [`AgentBehavior`] and runs the fixed task protocol
//! around it:
//! 1. mark running and record the current task,
//! 2. race the behaviour against the unit's cancellation token,
//! 3. record the outcome as state (only cancellation propagates),
//! 4. report the outcome to memory and clear the current task.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, render_details, truncate_chars};
use super::state::AgentState;
use crate::error::AgentError;

#[derive(Debug, Default)]
struct AgentInner {
    state: AgentState,
    current_task: Option<TaskDetails>,
    last_result: Option<String>,
    last_error: Option<String>,
}

/// Status view of an agent for snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    #[serde(rename = "type")]
    pub agent_type: String,
    pub state: AgentState,
    pub task: Option<TaskDetails>,
}

pub struct Agent {
    agent_type: String,
    ctx: AgentContext,
    behavior: Arc<dyn AgentBehavior>,
    inner: Mutex<AgentInner>,
}

/// Clears `current_task` however `receive_task` exits.
struct CurrentTaskGuard<'a>(&'a Mutex<AgentInner>);

impl Drop for CurrentTaskGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().current_task = None;
    }
}

impl Agent {
    pub fn new(
        agent_type: impl Into<String>,
        ctx: AgentContext,
        behavior: Arc<dyn AgentBehavior>,
    ) -> Self {
        let agent = Self {
            agent_type: agent_type.into(),
            ctx,
            behavior,
            inner: Mutex::new(AgentInner::default()),
        };
        debug!(agent_id = %agent.id(), agent_type = %agent.agent_type, "Agent initialized");
        agent
    }

    pub fn id(&self) -> &str {
        &self.ctx.agent_id
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn state(&self) -> AgentState {
        self.inner.lock().state
    }

    pub fn current_task(&self) -> Option<TaskDetails> {
        self.inner.lock().current_task.clone()
    }

    pub fn last_result(&self) -> Option<String> {
        self.inner.lock().last_result.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn info(&self) -> AgentInfo {
        let inner = self.inner.lock();
        AgentInfo {
            agent_type: self.agent_type.clone(),
            state: inner.state,
            task: inner.current_task.clone(),
        }
    }

    /// Process one task.
    ///
    /// Ordinary failures are recorded as [`AgentState::Error`] and return
    /// `Ok(())`; callers inspect [`state`](Self::state). Cancellation returns
    /// `Err(AgentError::Cancelled)`.
    pub async fn receive_task(
        &self,
        details: TaskDetails,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        {
            let mut inner = self.inner.lock();
            let state = inner.state;
            if state == AgentState::Stopped {
                return Err(AgentError::Stopped {
                    agent_id: self.id().to_string(),
                });
            }
            if !state.accepts_tasks() {
                return Err(AgentError::Busy {
                    agent_id: self.id().to_string(),
                });
            }
            inner.state = AgentState::Running;
            inner.current_task = Some(details.clone());
            inner.last_result = None;
            inner.last_error = None;
        }
        let _guard = CurrentTaskGuard(&self.inner);

        info!(
            agent_id = %self.id(),
            task = %truncate_chars(&render_details(&details), 100),
            "Agent received task"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.behavior.process_task(&self.ctx, &details) => result,
        };

        let (report, ret) = match outcome {
            Ok(result) => {
                self.finish(AgentState::Finished, |inner| {
                    inner.last_result = Some(result.clone())
                });
                info!(agent_id = %self.id(), "Agent finished task");
                (Some(result), Ok(()))
            }
            Err(AgentError::Cancelled) => {
                self.finish(AgentState::Cancelled, |_| {});
                warn!(agent_id = %self.id(), "Agent task cancelled");
                (None, Err(AgentError::Cancelled))
            }
            Err(e) => {
                let message = e.to_string();
                warn!(agent_id = %self.id(), error = %message, "Agent task failed");
                self.finish(AgentState::Error, |inner| {
                    inner.last_error = Some(message.clone())
                });
                (Some(format!("Error: {message}")), Ok(()))
            }
        };

        self.report_back(report).await;
        ret
    }

    fn finish(&self, target: AgentState, record: impl FnOnce(&mut AgentInner)) {
        let mut inner = self.inner.lock();
        record(&mut inner);
        let current = inner.state;
        // A concurrent stop() wins over the task outcome.
        if current.can_transition_to(target) {
            inner.state = target;
        }
    }

    async fn report_back(&self, report: Option<String>) {
        let Some(report) = report else {
            return;
        };
        debug!(agent_id = %self.id(), report = %truncate_chars(&report, 100), "Reporting back");
        let key = format!("{}_last_result", self.id());
        if let Err(e) = self
            .ctx
            .memory
            .store(&key, serde_json::Value::String(report), true)
            .await
        {
            warn!(agent_id = %self.id(), error = %e, "Failed to report result");
        }
    }

    /// Mark the agent stopped. It accepts no further tasks.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != AgentState::Stopped {
            info!(agent_id = %self.id(), "Stopping agent");
            inner.state = AgentState::Stopped;
        }
    }

    /// Record a failure that happened outside the task protocol, such as a
    /// panic in the unit driving this agent.
    pub(crate) fn mark_error(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.last_error = Some(message.into());
        if inner.state != AgentState::Stopped {
            inner.state = AgentState::Error;
        }
        inner.current_task = None;
    }

    pub fn holds_resources(&self) -> bool {
        self.behavior.holds_resources()
    }

    /// Release behaviour-held resources.
    pub async fn release(&self) -> Result<(), AgentError> {
        self.behavior.release(&self.ctx).await
    }

    /// Test hook: force a state.
    #[cfg(test)]
    pub(crate) fn set_state(&self, state: AgentState) {
        self.inner.lock().state = state;
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id())
            .field("agent_type", &self.agent_type)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl AgentBehavior for Echo {
        async fn process_task(
            &self,
            _ctx: &AgentContext,
            details: &TaskDetails,
        ) -> Result<String, AgentError> {
            Ok(format!("echo {}", details.len()))
        }
    }

    struct Fails;

    #[async_trait]
    impl AgentBehavior for Fails {
        async fn process_task(
            &self,
            _ctx: &AgentContext,
            _details: &TaskDetails,
        ) -> Result<String, AgentError> {
            Err(AgentError::Processing("boom".into()))
        }
    }

    struct Hangs;

    #[async_trait]
    impl AgentBehavior for Hangs {
        async fn process_task(
            &self,
            _ctx: &AgentContext,
            _details: &TaskDetails,
        ) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }
    }

    fn agent(behavior: Arc<dyn AgentBehavior>) -> (Agent, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::short_term_only());
        let ctx = AgentContext {
            agent_id: "test-0001".into(),
            llm: None,
            memory: memory.clone(),
            config: Arc::new(AgentsConfig::default()),
        };
        (Agent::new("test", ctx, behavior), memory)
    }

    fn details() -> TaskDetails {
        json!({"description": "x"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn success_records_and_reports() {
        let (agent, memory) = agent(Arc::new(Echo));
        agent
            .receive_task(details(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(agent.last_result().as_deref(), Some("echo 1"));
        assert!(agent.current_task().is_none());
        assert_eq!(
            memory.retrieve("test-0001_last_result", false).await,
            Some(json!("echo 1"))
        );
    }

    #[tokio::test]
    async fn failure_becomes_state_not_error() {
        let (agent, memory) = agent(Arc::new(Fails));
        let res = agent.receive_task(details(), &CancellationToken::new()).await;

        assert!(res.is_ok());
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(agent.last_error().as_deref(), Some("Processing failed: boom"));
        assert_eq!(
            memory.retrieve("test-0001_last_result", false).await,
            Some(json!("Error: Processing failed: boom"))
        );
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let (agent, memory) = agent(Arc::new(Hangs));
        let agent = Arc::new(agent);
        let token = CancellationToken::new();

        let handle = {
            let agent = agent.clone();
            let token = token.clone();
            tokio::spawn(async move { agent.receive_task(details(), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(agent.state(), AgentState::Running);
        assert!(agent.current_task().is_some());

        token.cancel();
        let res = handle.await.unwrap();
        assert!(matches!(res, Err(AgentError::Cancelled)));
        assert_eq!(agent.state(), AgentState::Cancelled);
        assert!(agent.current_task().is_none());
        assert_eq!(memory.retrieve("test-0001_last_result", false).await, None);
    }

    #[tokio::test]
    async fn busy_and_stopped_agents_reject_tasks() {
        let (agent, _) = agent(Arc::new(Echo));
        agent.set_state(AgentState::Running);
        let err = agent
            .receive_task(details(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Busy { .. }));

        agent.stop();
        let err = agent
            .receive_task(details(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Stopped { .. }));
    }

    #[tokio::test]
    async fn agent_is_reusable_after_outcome() {
        let (agent, _) = agent(Arc::new(Echo));
        let token = CancellationToken::new();
        agent.receive_task(details(), &token).await.unwrap();
        agent.receive_task(details(), &token).await.unwrap();
        assert_eq!(agent.state(), AgentState::Finished);
    }

    #[test]
    fn info_serializes_type_field() {
        let (agent, _) = agent(Arc::new(Echo));
        let value = serde_json::to_value(agent.info()).unwrap();
        assert_eq!(value["type"], "test");
        assert_eq!(value["state"], "idle");
    }
}
