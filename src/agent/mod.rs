//! Agents: the lifecycle wrapper plus the built-in task behaviours.

pub mod behavior;
pub mod browser;
pub mod generic;
pub mod info_hunter;
pub mod instance;
pub mod state;
pub mod sub_agent;
pub mod tool_creator;
pub mod tool_executor;

pub use behavior::{AgentBehavior, AgentContext, TaskDetails};
pub use browser::BrowserAgent;
pub use generic::GenericAgent;
pub use info_hunter::InfoHunterAgent;
pub use instance::{Agent, AgentInfo};
pub use state::AgentState;
pub use sub_agent::{SubTaskOutcome, execute_sub_task};
pub use tool_creator::ToolCreatorAgent;
pub use tool_executor::ToolExecutorAgent;

/// Built-in agent type names.
pub mod kinds {
    pub const GENERIC: &str = "generic";
    pub const INFO_HUNTER: &str = "info_hunter";
    pub const TOOL_CREATOR: &str = "tool_creator";
    pub const TOOL_EXECUTOR: &str = "tool_executor";
    pub const BROWSER: &str = "browser";

    /// Type hint meaning "infer from the task".
    pub const DEFAULT_HINT: &str = "default";
}
