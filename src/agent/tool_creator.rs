//! Tool-creation agent: turns a description into a runnable script.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, detail_str, truncate_chars};
use crate::error::{AgentError, LlmError};
use crate::llm::GenerateRequest;

#[derive(Debug, Default)]
pub struct ToolCreatorAgent;

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> String {
    let mut code = raw.trim();
    if let Some(rest) = code.strip_prefix("```") {
        // Drop the language tag line.
        code = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
    }
    if let Some(body) = code.trim_end().strip_suffix("```") {
        code = body;
    }
    code.trim().to_string()
}

impl ToolCreatorAgent {
    async fn generate_tool_code(
        &self,
        ctx: &AgentContext,
        description: &str,
    ) -> Result<String, AgentError> {
        let llm = ctx
            .llm
            .as_ref()
            .ok_or_else(|| LlmError::Unavailable("no model configured for tool creation".into()))?;

        let prompt = format!(
            "Based on the following description, generate a complete, self-contained Python script that performs the described task.\n\
             The script should be ready to run.\n\
             Include necessary imports.\n\
             If the task involves processing data, include example usage within an `if __name__ == \"__main__\":` block.\n\
             Focus on clarity and correctness.\n\n\
             Description: \"{description}\"\n\n\
             Python Code:\n```python\n"
        );
        let request = GenerateRequest::new(prompt)
            .with_system_prompt(
                "You are an expert Python programmer generating executable scripts based on descriptions.",
            )
            .with_max_tokens(1500)
            .with_temperature(0.5);

        let raw = llm.generate_text(request).await?;
        let code = strip_code_fences(&raw);
        if code.is_empty() {
            return Err(AgentError::Processing("model returned no code".into()));
        }
        Ok(code)
    }
}

#[async_trait]
impl AgentBehavior for ToolCreatorAgent {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let description = detail_str(details, "description")
            .ok_or_else(|| AgentError::InvalidTask("missing 'description'".into()))?;

        info!(agent_id = %ctx.agent_id, description, "Generating tool");
        let code = self.generate_tool_code(ctx, description).await?;

        let mut message =
            format!("Generated tool code for: '{description}'\n```python\n{code}\n```");

        if let Some(filename) = detail_str(details, "filename") {
            match tokio::fs::write(filename, &code).await {
                Ok(()) => {
                    info!(agent_id = %ctx.agent_id, filename, "Saved generated tool");
                    message.push_str(&format!("\nSaved to: {filename}"));
                }
                Err(e) => {
                    warn!(agent_id = %ctx.agent_id, filename, error = %e, "Failed to save tool");
                    message.push_str(&format!("\nError saving to file: {e}"));
                }
            }
        }

        let key = format!(
            "{}_generated_tool_{}",
            ctx.agent_id,
            truncate_chars(description, 20)
        );
        ctx.memory.store(&key, Value::String(code), true).await?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::llm::{FinishReason, GenerateResponse, LlmProvider};
    use crate::memory::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    struct CodeLlm;

    #[async_trait]
    impl LlmProvider for CodeLlm {
        fn model_name(&self) -> &str {
            "code"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
            Ok(GenerateResponse {
                content: "```python\nprint('hi')\n```".into(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn ctx(llm: bool) -> AgentContext {
        AgentContext {
            agent_id: "tool_creator-1".into(),
            llm: llm.then(|| Arc::new(CodeLlm) as Arc<dyn LlmProvider>),
            memory: Arc::new(MemoryStore::short_term_only()),
            config: Arc::new(AgentsConfig::default()),
        }
    }

    #[test]
    fn fences_stripped() {
        assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("```\nx = 1\n```  "), "x = 1");
        assert_eq!(strip_code_fences("x = 1"), "x = 1");
    }

    #[tokio::test]
    async fn generates_stores_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.py");
        let ctx = ctx(true);
        let details = json!({"description": "create a greeter", "filename": path.to_str().unwrap()})
            .as_object()
            .cloned()
            .unwrap();

        let out = ToolCreatorAgent.process_task(&ctx, &details).await.unwrap();
        assert!(out.contains("print('hi')"));
        assert!(out.contains("Saved to:"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')");
        assert_eq!(
            ctx.memory
                .retrieve("tool_creator-1_generated_tool_create a greeter", false)
                .await,
            Some(json!("print('hi')"))
        );
    }

    #[tokio::test]
    async fn requires_model() {
        let details = json!({"description": "create x"}).as_object().cloned().unwrap();
        let err = ToolCreatorAgent.process_task(&ctx(false), &details).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Unavailable(_))));
    }

    #[tokio::test]
    async fn requires_description() {
        let details = json!({}).as_object().cloned().unwrap();
        let err = ToolCreatorAgent.process_task(&ctx(true), &details).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidTask(_)));
    }
}
