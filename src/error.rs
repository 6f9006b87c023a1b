//! Error types for the agent cluster.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Language-model collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("LLM unavailable: {0}")]
    Unavailable(String),
}

/// Memory/store collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised while an agent processes a task.
///
/// `Cancelled` is special: it is always propagated out of
/// [`Agent::receive_task`](crate::agent::Agent::receive_task), never retried.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Agent {agent_id} is busy")]
    Busy { agent_id: String },

    #[error("Agent {agent_id} is stopped")]
    Stopped { agent_id: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Dispatch-time errors. Neither counts against a task's retry budget.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Maximum concurrent agents ({max}) reached")]
    CapacityExceeded { max: usize },

    #[error("No agent could be built for type {agent_type}: {reason}")]
    RoutingFailure { agent_type: String, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(AgentError::Cancelled.is_cancelled());
        assert!(!AgentError::Processing("boom".into()).is_cancelled());
    }

    #[test]
    fn dispatch_errors_convert_to_top_level() {
        let err: Error = DispatchError::CapacityExceeded { max: 3 }.into();
        assert_eq!(
            err.to_string(),
            "Dispatch error: Maximum concurrent agents (3) reached"
        );
    }
}
