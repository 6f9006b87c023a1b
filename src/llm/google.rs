//! Google Gemini `generateContent` provider.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::provider::{FinishReason, GenerateRequest, GenerateResponse, LlmProvider};
use super::status_error;
use crate::error::LlmError;

const PROVIDER: &str = "google";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleProvider {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GoogleProvider {
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
impl LlmProvider for GoogleProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        );
        tracing::debug!(model, max_tokens = request.max_tokens, "Gemini generation");

        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": request.system_prompt}]},
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "maxOutputTokens": request.max_tokens,
                "temperature": request.temperature,
            },
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
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

        parse_google_response(&resp_body)
    }
}

pub(crate) fn parse_google_response(
    body: &serde_json::Value,
) -> Result<GenerateResponse, LlmError> {
    let Some(candidate) = body["candidates"].as_array().and_then(|c| c.first()) else {
        let reason = body["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("Unknown");
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("generation blocked (reason: {reason})"),
        });
    };

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response blocked or empty".to_string(),
        });
    }

    let finish_reason = match candidate["finishReason"].as_str() {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        _ => FinishReason::Other,
    };

    let usage = &body["usageMetadata"];
    Ok(GenerateResponse {
        content: text,
        input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        finish_reason,
    })
}
