//! OpenAI chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::provider::{FinishReason, GenerateRequest, GenerateResponse, LlmProvider};
use super::status_error;
use crate::error::LlmError;

const PROVIDER: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        tracing::debug!(model, max_tokens = request.max_tokens, "OpenAI generation");

        let body = serde_json::json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.prompt},
            ],
        });

        let resp = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let resp_body: serde_json::Value =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(status_error(PROVIDER, status, &resp_body));
        }

        parse_openai_response(&resp_body)
    }
}

pub(crate) fn parse_openai_response(
    body: &serde_json::Value,
) -> Result<GenerateResponse, LlmError> {
    let choice = &body["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "missing choices[0].message.content".to_string(),
        })?;

    let finish_reason = match choice["finish_reason"].as_str() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        _ => FinishReason::Other,
    };

    let usage = &body["usage"];
    Ok(GenerateResponse {
        content: content.to_string(),
        input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " hi "}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let resp = parse_openai_response(&body).unwrap();
        assert_eq!(resp.content, " hi ");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let body = serde_json::json!({"choices": []});
        let err = parse_openai_response(&body).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }
}
