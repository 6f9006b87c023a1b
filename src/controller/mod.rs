//! The controller: one owning orchestrator for the queue, the live agents and
//! the in-flight units.
//!
//! ```text
//!  assign_task ──► TaskQueue ──► dispatch loop ──► AgentRouter ──► AgentRegistry
//!                     ▲                │
//!                     │ retry          ▼ spawn
//!               complete_unit ◄── unit (Agent::receive_task)
//!                     │
//!                     ▼
//!             CompletionHistory ──► StatusSnapshot ──► MemoryStore
//! ```

mod completion;
mod dispatcher;
pub mod history;
pub mod queue;
pub mod registry;
pub mod router;
mod shutdown;
mod status;
pub mod task;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub use history::{CompletionHistory, HistoryEntry};
pub use queue::TaskQueue;
pub use registry::AgentRegistry;
pub use router::{AgentDeps, AgentRouter, BehaviorFactory, factory, infer_type};
pub use shutdown::ShutdownReport;
pub use status::StatusSnapshot;
pub use task::{Task, TaskStatus};

use crate::agent::TaskDetails;
use crate::config::{ClusterConfig, ControllerConfig};
use crate::error::Error;
use crate::llm::{LlmConfig, create_provider};
use crate::memory::MemoryStore;

/// A dispatched unit of work.
struct InFlight {
    task_id: Uuid,
    cancel: CancellationToken,
    /// Completion watcher; taken by shutdown to await it.
    handle: Option<JoinHandle<()>>,
}

pub struct Controller {
    config: ControllerConfig,
    queue: TaskQueue,
    registry: AgentRegistry,
    router: AgentRouter,
    history: CompletionHistory,
    memory: Arc<MemoryStore>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    running: AtomicBool,
    shutdown_signal: CancellationToken,
    shutting_down: AtomicBool,
    shutdown_done: AtomicBool,
}

impl Controller {
    /// Build a controller around an already configured router.
    pub fn new(config: ControllerConfig, router: AgentRouter) -> Arc<Self> {
        let memory = router.deps().memory.clone();
        info!(
            max_agents = config.max_concurrent_agents,
            max_retries = config.max_task_retries,
            memory_backend = memory.backend_name().unwrap_or("short_term_only"),
            "Controller initialized"
        );
        Arc::new(Self {
            queue: TaskQueue::new(),
            registry: AgentRegistry::new(config.max_concurrent_agents),
            history: CompletionHistory::new(config.history_limit),
            router,
            memory,
            in_flight: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
            shutdown_signal: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
            shutdown_done: AtomicBool::new(false),
            config,
        })
    }

    /// Construct the collaborators named by the configuration and the
    /// controller around them.
    pub async fn from_config(config: &ClusterConfig) -> Result<Arc<Self>, Error> {
        let memory = Arc::new(MemoryStore::from_config(&config.memory).await?);

        let llm = match LlmConfig::from_settings(&config.llm)? {
            Some(llm_config) => Some(create_provider(&llm_config)?),
            None => None,
        };

        let router = AgentRouter::new(AgentDeps {
            llm,
            memory,
            config: Arc::new(config.agents.clone()),
        });
        Ok(Self::new(config.controller.clone(), router))
    }

    /// Queue fresh work at the tail.
    pub async fn assign_task(&self, details: TaskDetails) -> Uuid {
        self.queue.enqueue(details).await
    }

    /// Queue a retry at the head with a fresh id.
    pub async fn assign_retry(&self, details: TaskDetails, retry_count: u32) -> Uuid {
        self.queue.enqueue_retry(details, retry_count).await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn history(&self) -> &CompletionHistory {
        &self.history
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Number of units currently dispatched.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
