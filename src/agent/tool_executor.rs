//! Tool-execution agent: runs a script in a subprocess.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, truncate_chars};
use crate::error::AgentError;

/// Maximum bytes kept from each output stream.
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct ToolExecutorAgent;

/// Captured result of one run.
#[derive(Debug)]
struct Execution {
    code: i32,
    stdout: String,
    stderr: String,
}

impl Execution {
    fn render(&self) -> String {
        let mut out = format!("--- Execution Result (Return Code: {}) ---\n", self.code);
        if !self.stdout.trim().is_empty() {
            out.push_str(&format!("--- STDOUT ---\n{}\n", self.stdout.trim()));
        }
        if !self.stderr.trim().is_empty() {
            out.push_str(&format!("--- STDERR ---\n{}\n", self.stderr.trim()));
        }
        if self.stdout.trim().is_empty() && self.stderr.trim().is_empty() {
            out.push_str("(No output captured)");
        }
        out.trim().to_string()
    }
}

fn lossy_truncated(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_OUTPUT_SIZE);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl ToolExecutorAgent {
    async fn resolve_code(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let value = match details.get("code") {
            Some(v) if !v.is_null() => Some(v.clone()),
            _ => match details.get("code_key").and_then(Value::as_str) {
                Some(key) => {
                    debug!(agent_id = %ctx.agent_id, key, "Retrieving code from memory");
                    ctx.memory.retrieve(key, true).await
                }
                None => None,
            },
        };

        match value {
            Some(Value::String(code)) if !code.trim().is_empty() => Ok(code),
            Some(Value::String(_)) | None => Err(AgentError::InvalidTask(
                "no code provided or found in memory".into(),
            )),
            Some(other) => Err(AgentError::InvalidTask(format!(
                "code must be a string, got {}",
                json_type(&other)
            ))),
        }
    }

    async fn run_script(
        &self,
        interpreter: &str,
        script: &Path,
        timeout: Duration,
    ) -> Result<Execution, AgentError> {
        let child = Command::new(interpreter)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AgentError::Processing(format!("interpreter '{interpreter}' not found"))
                }
                _ => AgentError::Processing(format!("failed to spawn '{interpreter}': {e}")),
            })?;

        // On timeout the child is dropped inside the future, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AgentError::Timeout(timeout))??;

        Ok(Execution {
            code: output.status.code().unwrap_or(-1),
            stdout: lossy_truncated(&output.stdout),
            stderr: lossy_truncated(&output.stderr),
        })
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Script file removed when dropped, including when a cancelled unit drops
/// the future mid-run.
fn script_file(agent_id: &str) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&format!("{agent_id}-"))
        .suffix(".py")
        .tempfile()
}

#[async_trait]
impl AgentBehavior for ToolExecutorAgent {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let code = self.resolve_code(ctx, details).await?;
        let settings = &ctx.config.tool_executor;
        let timeout = settings.timeout();

        let script = script_file(&ctx.agent_id)?;
        tokio::fs::write(script.path(), &code).await?;
        info!(
            agent_id = %ctx.agent_id,
            interpreter = %settings.interpreter,
            timeout_secs = timeout.as_secs(),
            snippet = %truncate_chars(&code, 100),
            "Executing script"
        );

        let execution = self
            .run_script(&settings.interpreter, script.path(), timeout)
            .await?;
        info!(agent_id = %ctx.agent_id, code = execution.code, "Execution finished");
        Ok(execution.render())
    }
}
