//! Agent state machine.

use serde::{Deserialize, Serialize};

/// State of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Constructed, no task yet.
    #[default]
    Idle,
    /// Processing a task.
    Running,
    /// Last task produced a result.
    Finished,
    /// Last task failed.
    Error,
    /// Last task was cancelled mid-flight.
    Cancelled,
    /// Shut down; accepts no further tasks.
    Stopped,
}

impl AgentState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: AgentState) -> bool {
        use AgentState::*;

        matches!(
            (self, target),
            (Idle, Running)
                | (Running, Finished)
                | (Running, Error)
                | (Running, Cancelled)
                | (Finished, Idle)
                | (Error, Idle)
                | (Cancelled, Idle)
                | (Finished, Running)
                | (Error, Running)
                | (Cancelled, Running)
        ) || (target == Stopped && *self != Stopped)
    }

    /// Whether a task outcome has been recorded.
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Cancelled)
    }

    /// Whether the agent may be handed a new task.
    pub fn accepts_tasks(&self) -> bool {
        !matches!(self, Self::Running | Self::Stopped)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}
