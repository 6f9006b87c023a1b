//! The scheduling loop.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::task::{Task, TaskStatus};
use super::{Controller, InFlight, ShutdownReport};
use crate::agent::Agent;
use crate::error::DispatchError;

impl Controller {
    /// Run the dispatch loop until shutdown is requested (or, with
    /// `exit_when_idle`, until no work remains), then shut down.
    ///
    /// Returns the shutdown report, or `None` if another caller already
    /// performed the shutdown.
    pub async fn run(self: &Arc<Self>) -> Option<ShutdownReport> {
        info!("Controller run loop started");
        let tick = self.config.dispatch_tick();
        let interval = self.config.status_update_interval();
        let mut last_publish: Option<Instant> = None;

        while self.is_running() {
            self.dispatch_pending().await;

            // Agents leave the registry last in completion, so an empty
            // registry means every completion (and any retry it queued) has
            // landed. Read it first; the queue read after it is then final.
            if self.config.exit_when_idle
                && self.registry.is_empty().await
                && self.in_flight.lock().await.is_empty()
                && self.queue.is_empty().await
            {
                info!("Queue drained and no units in flight, stopping");
                break;
            }

            if last_publish.is_none_or(|at| at.elapsed() >= interval) {
                self.publish_status().await;
                last_publish = Some(Instant::now());
            }

            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.shutdown_signal.cancelled() => {
                    debug!("Shutdown signal received");
                }
            }
        }

        self.shutdown().await
    }

    /// Admit queued tasks while there is capacity.
    pub(crate) async fn dispatch_pending(self: &Arc<Self>) {
        let mut deferred = Vec::new();

        while self.is_running() && self.registry.has_capacity().await {
            let Some(task) = self.queue.dequeue().await else {
                break;
            };

            match self.router.route(&self.registry, &task.details).await {
                Ok(agent) => self.launch(agent, task).await,
                Err(DispatchError::CapacityExceeded { max }) => {
                    debug!(task_id = %task.id, max, "No agent slot, task returned to queue");
                    self.queue.requeue_front(task).await;
                    break;
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Routing failed, task deferred");
                    deferred.push(task);
                }
            }
        }

        for task in deferred {
            self.queue.requeue_back(task).await;
        }
    }

    /// Spawn the unit for `task` on `agent` and its completion watcher.
    async fn launch(self: &Arc<Self>, agent: Arc<Agent>, mut task: Task) {
        // Held until the entry is inserted so a fast unit cannot complete
        // before it is tracked.
        let mut in_flight = self.in_flight.lock().await;

        // Shutdown flips `running` before it snapshots `in_flight`, so a
        // launch that gets here afterwards must not start a unit it would
        // never cancel.
        if !self.is_running() {
            debug!(
                task_id = %task.id,
                agent_id = %agent.id(),
                "Shutdown under way, launch abandoned"
            );
            drop(in_flight);
            self.registry.remove(agent.id()).await;
            self.queue.requeue_front(task).await;
            return;
        }

        if let Err(e) = task.transition_to(TaskStatus::Running) {
            warn!(task_id = %task.id, error = %e, "Unexpected task status at dispatch");
        }
        let cancel = CancellationToken::new();
        let agent_id = agent.id().to_string();
        let task_id = task.id;

        let work = {
            let agent = agent.clone();
            let details = task.details.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { agent.receive_task(details, &cancel).await })
        };

        let watcher = {
            let controller = self.clone();
            tokio::spawn(async move {
                let joined = work.await;
                controller.complete_unit(agent, task, joined).await;
            })
        };

        in_flight.insert(
            agent_id.clone(),
            InFlight {
                task_id,
                cancel,
                handle: Some(watcher),
            },
        );
        info!(
            task_id = %task_id,
            agent_id = %agent_id,
            in_flight = in_flight.len(),
            "Task dispatched"
        );
    }
}
