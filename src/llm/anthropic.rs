//! Anthropic messages provider.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::provider::{FinishReason, GenerateRequest, GenerateResponse, LlmProvider};
use super::status_error;
use crate::error::LlmError;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
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
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        tracing::debug!(model, max_tokens = request.max_tokens, "Anthropic generation");

        let body = serde_json::json!({
            "model": model,
            "system": request.system_prompt,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
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

        parse_anthropic_response(&resp_body)
    }
}

pub(crate) fn parse_anthropic_response(
    body: &serde_json::Value,
) -> Result<GenerateResponse, LlmError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "missing content".to_string(),
        })?;

    let text = blocks
        .iter()
        .filter(|b| b["type"].as_str() == Some("text"))
        .filter_map(|b| b["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let finish_reason = match body["stop_reason"].as_str() {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Other,
    };

    let usage = &body["usage"];
    Ok(GenerateResponse {
        content: text,
        input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 4, "output_tokens": 9}
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert_eq!(resp.content, "first\nsecond");
        assert_eq!(resp.finish_reason, FinishReason::Length);
        assert_eq!(resp.output_tokens, 9);
    }

    #[test]
    fn missing_content_rejected() {
        let err = parse_anthropic_response(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }
}
