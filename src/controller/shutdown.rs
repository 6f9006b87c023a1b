//! Orderly shutdown.

use std::sync::atomic::Ordering;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::Controller;

/// What the shutdown sequence did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    pub cancelled_units: usize,
    pub stopped_agents: usize,
    pub dropped_tasks: usize,
    /// Agent cleanups that failed; shutdown carried on regardless.
    pub cleanup_failures: Vec<String>,
}

impl Controller {
    /// Ask a running loop to stop. Safe to call from any task, any number of
    /// times.
    pub fn request_shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        self.shutdown_signal.cancel();
    }

    /// Stop admitting work, cancel and await every unit, stop and release
    /// every agent, then clear the queue and the published status.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        if self.shutdown_done.swap(true, Ordering::SeqCst) {
            return None;
        }
        info!("Controller shutting down");
        self.running.store(false, Ordering::SeqCst);
        self.shutting_down.store(true, Ordering::SeqCst);
        self.shutdown_signal.cancel();

        let mut report = ShutdownReport::default();

        let (tokens, watchers): (Vec<_>, Vec<_>) = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .values_mut()
                .map(|unit| (unit.cancel.clone(), unit.handle.take()))
                .unzip()
        };
        report.cancelled_units = tokens.len();
        if !tokens.is_empty() {
            info!(units = tokens.len(), "Cancelling in-flight units");
        }
        for token in &tokens {
            token.cancel();
        }
        for joined in join_all(watchers.into_iter().flatten()).await {
            if let Err(e) = joined {
                warn!(error = %e, "Completion watcher failed during shutdown");
            }
        }

        let agents = self.registry.drain().await;
        report.stopped_agents = agents.len();
        for agent in agents {
            agent.stop();
            if agent.holds_resources()
                && let Err(e) = agent.release().await
            {
                warn!(agent_id = %agent.id(), error = %e, "Agent cleanup failed");
                report.cleanup_failures.push(format!("{}: {e}", agent.id()));
            }
        }

        report.dropped_tasks = self.queue.clear().await;
        self.in_flight.lock().await.clear();
        self.clear_status().await;

        info!(
            cancelled_units = report.cancelled_units,
            stopped_agents = report.stopped_agents,
            dropped_tasks = report.dropped_tasks,
            cleanup_failures = report.cleanup_failures.len(),
            "Controller shutdown complete"
        );
        Some(report)
    }
}
