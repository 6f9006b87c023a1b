//! Configuration types.
//!
//! Loaded from a YAML file; every section falls back to its defaults so a
//! partial (or empty) file is valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default memory key the controller publishes its status under.
pub const DEFAULT_STATUS_KEY: &str = "tac_controller_status";

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub controller: ControllerConfig,
    pub llm: LlmSettings,
    pub memory: MemoryConfig,
    pub agents: AgentsConfig,
    pub logging: LoggingConfig,
}

impl ClusterConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.max_concurrent_agents == 0 {
            return Err(ConfigError::InvalidValue {
                key: "controller.max_concurrent_agents".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.controller.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "controller.history_limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on simultaneously live agents.
    pub max_concurrent_agents: usize,
    /// Re-enqueues allowed for a failing task.
    pub max_task_retries: u32,
    /// Seconds between status publications.
    pub status_update_interval_secs: u64,
    /// Dispatch loop yield between iterations, in milliseconds.
    pub dispatch_tick_ms: u64,
    /// Terminal entries kept in the completion history.
    pub history_limit: usize,
    /// Memory key for the published status document.
    pub status_key: String,
    /// Stop on its own once the queue and in-flight set are both empty.
    pub exit_when_idle: bool,
}

impl ControllerConfig {
    pub fn status_update_interval(&self) -> Duration {
        Duration::from_secs(self.status_update_interval_secs)
    }

    pub fn dispatch_tick(&self) -> Duration {
        Duration::from_millis(self.dispatch_tick_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 5,
            max_task_retries: 1,
            status_update_interval_secs: 5,
            dispatch_tick_ms: 500,
            history_limit: 50,
            status_key: DEFAULT_STATUS_KEY.to_string(),
            exit_when_idle: false,
        }
    }
}

/// Language-model settings. The API key is read from `<PROVIDER>_API_KEY`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub default_model: Option<String>,
    /// Per-provider default model, keyed by provider name. Wins over
    /// `default_model`.
    pub provider_models: HashMap<String, String>,
    pub request_timeout_secs: u64,
    /// Override for the provider's API base URL.
    pub base_url: Option<String>,
}

impl LlmSettings {
    /// Environment variable holding the API key for the configured provider.
    pub fn api_key_var(&self) -> String {
        format!("{}_API_KEY", self.provider.to_uppercase())
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            default_model: None,
            provider_models: HashMap::new(),
            request_timeout_secs: 120,
            base_url: None,
        }
    }
}

/// Which persistent backend sits behind the short-term cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    #[default]
    JsonFile,
    Libsql,
    ShortTermOnly,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: MemoryBackendKind,
    pub json_file: JsonFileConfig,
    pub libsql: LibSqlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JsonFileConfig {
    pub path: PathBuf,
}

impl Default for JsonFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./tac_memory.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibSqlConfig {
    pub path: PathBuf,
}

impl Default for LibSqlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tac_memory.db"),
        }
    }
}

/// Settings handed to every agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub allow_dynamic_sub_agents: bool,
    /// Simulated work delay used by the placeholder agents.
    pub simulated_work_ms: u64,
    pub tool_executor: ToolExecutorConfig,
    pub browser: BrowserConfig,
}

impl AgentsConfig {
    pub fn simulated_work(&self) -> Duration {
        Duration::from_millis(self.simulated_work_ms)
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            allow_dynamic_sub_agents: false,
            simulated_work_ms: 1000,
            tool_executor: ToolExecutorConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolExecutorConfig {
    pub timeout_secs: u64,
    /// Interpreter used to run generated scripts.
    pub interpreter: String,
}

impl ToolExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            interpreter: "python3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file; rotated daily.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ClusterConfig::from_yaml("").unwrap();
        assert_eq!(config.controller.max_concurrent_agents, 5);
        assert_eq!(config.controller.max_task_retries, 1);
        assert_eq!(config.controller.history_limit, 50);
        assert_eq!(config.controller.status_key, DEFAULT_STATUS_KEY);
        assert_eq!(config.memory.backend, MemoryBackendKind::JsonFile);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let raw = r#"
controller:
  max_concurrent_agents: 2
memory:
  backend: short_term_only
agents:
  tool_executor:
    timeout_secs: 5
"#;
        let config = ClusterConfig::from_yaml(raw).unwrap();
        assert_eq!(config.controller.max_concurrent_agents, 2);
        assert_eq!(config.controller.max_task_retries, 1);
        assert_eq!(config.memory.backend, MemoryBackendKind::ShortTermOnly);
        assert_eq!(config.agents.tool_executor.timeout(), Duration::from_secs(5));
        assert_eq!(config.agents.tool_executor.interpreter, "python3");
    }

    #[test]
    fn example_config_parses() {
        let config = ClusterConfig::from_yaml(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.agents.browser.webdriver_url, "http://localhost:4444");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let raw = "controller:\n  max_concurrent_agents: 0\n";
        let err = ClusterConfig::from_yaml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = ClusterConfig::from_yaml("controller: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_reported() {
        let err = ClusterConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn api_key_var_follows_provider() {
        let llm = LlmSettings {
            provider: "anthropic".into(),
            ..Default::default()
        };
        assert_eq!(llm.api_key_var(), "ANTHROPIC_API_KEY");
    }
}
