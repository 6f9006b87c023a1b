//! Live agent registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agent::{Agent, AgentInfo};
use crate::error::DispatchError;

/// Agents currently alive, keyed by id, bounded at `max`.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
    max: usize,
}

impl AgentRegistry {
    pub fn new(max: usize) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    pub async fn has_capacity(&self) -> bool {
        self.len().await < self.max
    }

    /// Register an agent, refusing when at the bound.
    ///
    /// Callers serialise check-construct-insert; this check is the backstop.
    pub(crate) async fn insert(&self, agent: Arc<Agent>) -> Result<(), DispatchError> {
        let mut agents = self.agents.write().await;
        if agents.len() >= self.max {
            return Err(DispatchError::CapacityExceeded { max: self.max });
        }
        agents.insert(agent.id().to_string(), agent);
        Ok(())
    }

    pub async fn get(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub(crate) async fn remove(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.agents.write().await.remove(agent_id)
    }

    /// Remove and return every agent.
    pub(crate) async fn drain(&self) -> Vec<Arc<Agent>> {
        self.agents.write().await.drain().map(|(_, a)| a).collect()
    }

    /// Per-agent status, ordered by id.
    pub async fn snapshot(&self) -> BTreeMap<String, AgentInfo> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(id, agent)| (id.clone(), agent.info()))
            .collect()
    }
}
