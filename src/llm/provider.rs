//! Provider trait and request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single-turn generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: String,
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

/// A hosted text-generation model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model used when a request does not name one.
    fn model_name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;

    /// Convenience wrapper returning only the trimmed text.
    async fn generate_text(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let response = self.generate(request).await?;
        Ok(response.content.trim().to_string())
    }
}
