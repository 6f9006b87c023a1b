//! Agent routing: pick a type for a task and construct the agent under the
//! concurrency bound.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::AgentRegistry;
use crate::agent::kinds::{self, DEFAULT_HINT};
use crate::agent::{
    Agent, AgentBehavior, AgentContext, BrowserAgent, GenericAgent, InfoHunterAgent, TaskDetails,
    ToolCreatorAgent, ToolExecutorAgent,
};
use crate::config::AgentsConfig;
use crate::error::DispatchError;
use crate::llm::LlmProvider;
use crate::memory::MemoryStore;

/// Collaborators every agent is built with.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub memory: Arc<MemoryStore>,
    pub config: Arc<AgentsConfig>,
}

/// Builds a fresh behaviour for one agent.
pub type BehaviorFactory =
    Arc<dyn Fn() -> Result<Arc<dyn AgentBehavior>, String> + Send + Sync>;

/// Wrap an infallible constructor as a factory.
pub fn factory<B, F>(make: F) -> BehaviorFactory
where
    B: AgentBehavior + 'static,
    F: Fn() -> B + Send + Sync + 'static,
{
    Arc::new(move || Ok(Arc::new(make()) as Arc<dyn AgentBehavior>))
}

const RESEARCH_KEYWORDS: [&str; 3] = ["find", "research", "gather"];

/// Infer an agent type from the shape of the task. First match wins.
pub fn infer_type(details: &TaskDetails) -> &'static str {
    let description = details
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_lowercase);

    if details.contains_key("url") {
        kinds::BROWSER
    } else if description.as_deref().is_some_and(|d| d.contains("create")) {
        kinds::TOOL_CREATOR
    } else if details.contains_key("code") || details.contains_key("code_key") {
        kinds::TOOL_EXECUTOR
    } else if description
        .as_deref()
        .is_some_and(|d| RESEARCH_KEYWORDS.iter().any(|k| d.contains(k)))
    {
        kinds::INFO_HUNTER
    } else {
        kinds::GENERIC
    }
}

pub struct AgentRouter {
    factories: HashMap<String, BehaviorFactory>,
    deps: AgentDeps,
    creation_lock: Mutex<()>,
}

impl AgentRouter {
    /// Router with the built-in agent types registered.
    pub fn new(deps: AgentDeps) -> Self {
        let mut router = Self {
            factories: HashMap::new(),
            deps,
            creation_lock: Mutex::new(()),
        };
        router.register(kinds::GENERIC, factory(|| GenericAgent));
        router.register(kinds::INFO_HUNTER, factory(|| InfoHunterAgent));
        router.register(kinds::TOOL_CREATOR, factory(|| ToolCreatorAgent));
        router.register(kinds::TOOL_EXECUTOR, factory(|| ToolExecutorAgent));
        router.register(kinds::BROWSER, factory(BrowserAgent::new));
        router
    }

    /// Add or replace the factory for a type name.
    pub fn register(&mut self, agent_type: impl Into<String>, factory: BehaviorFactory) {
        self.factories.insert(agent_type.into(), factory);
    }

    pub fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    /// Effective type for a hint: `default` infers, unknown names fall back
    /// to the generic agent.
    pub fn resolve_type(&self, hint: &str, details: &TaskDetails) -> String {
        if hint == DEFAULT_HINT {
            return infer_type(details).to_string();
        }
        if self.factories.contains_key(hint) {
            return hint.to_string();
        }
        warn!(hint, "Unknown agent type hint, using generic agent");
        kinds::GENERIC.to_string()
    }

    /// Create and register an agent for the task.
    ///
    /// Check, construct and insert happen under one lock so racing callers
    /// cannot overshoot the registry bound.
    pub async fn route(
        &self,
        registry: &AgentRegistry,
        details: &TaskDetails,
    ) -> Result<Arc<Agent>, DispatchError> {
        let hint = details
            .get("agent_type")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_HINT);
        let agent_type = self.resolve_type(hint, details);

        let _guard = self.creation_lock.lock().await;

        if !registry.has_capacity().await {
            debug!(max = registry.max(), "Agent limit reached");
            return Err(DispatchError::CapacityExceeded {
                max: registry.max(),
            });
        }

        let factory = self
            .factories
            .get(&agent_type)
            .ok_or_else(|| DispatchError::RoutingFailure {
                agent_type: agent_type.clone(),
                reason: "no factory registered".to_string(),
            })?;
        let behavior = factory().map_err(|reason| DispatchError::RoutingFailure {
            agent_type: agent_type.clone(),
            reason,
        })?;

        let suffix = Uuid::new_v4().simple().to_string();
        let agent_id = format!("{agent_type}-{}", &suffix[..8]);
        let ctx = AgentContext {
            agent_id: agent_id.clone(),
            llm: self.deps.llm.clone(),
            memory: self.deps.memory.clone(),
            config: self.deps.config.clone(),
        };
        let agent = Arc::new(Agent::new(agent_type.clone(), ctx, behavior));
        registry.insert(agent.clone()).await?;

        info!(agent_id = %agent_id, agent_type = %agent_type, hint, "Agent created");
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(v: serde_json::Value) -> TaskDetails {
        v.as_object().cloned().unwrap()
    }

    fn deps() -> AgentDeps {
        AgentDeps {
            llm: None,
            memory: Arc::new(MemoryStore::short_term_only()),
            config: Arc::new(AgentsConfig::default()),
        }
    }

    #[test]
    fn inference_rules_in_order() {
        assert_eq!(
            infer_type(&details(json!({"url": "https://x", "description": "create"}))),
            kinds::BROWSER
        );
        assert_eq!(
            infer_type(&details(json!({"description": "Create a parser", "code": "x"}))),
            kinds::TOOL_CREATOR
        );
        assert_eq!(
            infer_type(&details(json!({"description": "find things", "code_key": "k"}))),
            kinds::TOOL_EXECUTOR
        );
        assert_eq!(
            infer_type(&details(json!({"description": "Research rust"}))),
            kinds::INFO_HUNTER
        );
        assert_eq!(
            infer_type(&details(json!({"description": "say hi"}))),
            kinds::GENERIC
        );
        assert_eq!(infer_type(&details(json!({}))), kinds::GENERIC);
    }

    #[test]
    fn explicit_hints() {
        let router = AgentRouter::new(deps());
        let d = details(json!({"description": "find x"}));
        assert_eq!(router.resolve_type("tool_executor", &d), "tool_executor");
        assert_eq!(router.resolve_type("synthesizer", &d), "generic");
        assert_eq!(router.resolve_type("default", &d), "info_hunter");
    }

    #[tokio::test]
    async fn route_registers_type_prefixed_agent() {
        let router = AgentRouter::new(deps());
        let registry = AgentRegistry::new(2);
        let agent = router
            .route(&registry, &details(json!({"description": "gather facts"})))
            .await
            .unwrap();

        assert_eq!(agent.agent_type(), "info_hunter");
        assert!(agent.id().starts_with("info_hunter-"));
        assert_eq!(agent.id().len(), "info_hunter-".len() + 8);
        assert!(registry.get(agent.id()).await.is_some());
    }

    #[tokio::test]
    async fn route_refuses_at_capacity() {
        let router = AgentRouter::new(deps());
        let registry = AgentRegistry::new(1);
        router.route(&registry, &details(json!({}))).await.unwrap();

        let err = router.route(&registry, &details(json!({}))).await.unwrap_err();
        assert!(matches!(err, DispatchError::CapacityExceeded { max: 1 }));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_routes_never_overshoot() {
        let router = Arc::new(AgentRouter::new(deps()));
        let registry = Arc::new(AgentRegistry::new(3));

        let attempts = (0..20).map(|_| {
            let router = router.clone();
            let registry = registry.clone();
            tokio::spawn(async move { router.route(&registry, &TaskDetails::new()).await.is_ok() })
        });
        let created = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();

        assert_eq!(created, 3);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn failing_factory_is_routing_failure() {
        let mut router = AgentRouter::new(deps());
        router.register(
            "broken",
            Arc::new(|| -> Result<Arc<dyn AgentBehavior>, String> {
                Err("unavailable".to_string())
            }),
        );
        let registry = AgentRegistry::new(2);

        let err = router
            .route(&registry, &details(json!({"agent_type": "broken"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RoutingFailure { agent_type, .. } if agent_type == "broken"));
        assert!(registry.is_empty().await);
    }
}
