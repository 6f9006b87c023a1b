//! Language-model collaborator.
//!
//! Supports:
//! - **OpenAI**: chat completions over HTTP
//! - **Anthropic**: messages API over HTTP
//! - **Google**: Gemini `generateContent` over HTTP
//!
//! Agents only see `Arc<dyn LlmProvider>`; when no API key is configured the
//! controller hands them `None` and they degrade instead of failing.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::LlmSettings;
use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    Google,
    OpenAi,
}

impl LlmBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::OpenAi => "openai",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Google => "gemini-1.5-flash",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl LlmConfig {
    /// Resolve settings plus the `<PROVIDER>_API_KEY` environment variable.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn from_settings(settings: &LlmSettings) -> Result<Option<Self>, LlmError> {
        let backend: LlmBackend = settings.provider.parse()?;
        let var = settings.api_key_var();
        let Ok(key) = std::env::var(&var) else {
            tracing::warn!(
                provider = backend.name(),
                "{var} not set; model collaborator disabled"
            );
            return Ok(None);
        };
        Ok(Some(Self::with_key(settings, backend, SecretString::from(key))))
    }

    /// Model precedence: `provider_models.<provider>`, then `default_model`,
    /// then the backend's built-in default.
    fn with_key(settings: &LlmSettings, backend: LlmBackend, api_key: SecretString) -> Self {
        let set = |m: &&String| !m.trim().is_empty();
        let model = settings
            .provider_models
            .get(backend.name())
            .filter(set)
            .or(settings.default_model.as_ref().filter(set))
            .cloned()
            .unwrap_or_else(|| backend.default_model().to_string());
        Self {
            backend,
            api_key,
            model,
            base_url: settings.base_url.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider: Arc<dyn LlmProvider> = match config.backend {
        LlmBackend::Anthropic => Arc::new(AnthropicProvider::new(
            config.api_key.clone(),
            &config.model,
            config.base_url.clone(),
            config.request_timeout,
        )?),
        LlmBackend::Google => Arc::new(GoogleProvider::new(
            config.api_key.clone(),
            &config.model,
            config.base_url.clone(),
            config.request_timeout,
        )?),
        LlmBackend::OpenAi => Arc::new(OpenAiProvider::new(
            config.api_key.clone(),
            &config.model,
            config.base_url.clone(),
            config.request_timeout,
        )?),
    };
    tracing::info!("Using {} (model: {})", config.backend.name(), config.model);
    Ok(provider)
}

/// Map a non-success HTTP status to an error.
pub(crate) fn status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &serde_json::Value,
) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        429 => LlmError::RateLimited {
            provider: provider.to_string(),
        },
        500..=599 => LlmError::Unavailable(format!("{provider} returned {status}")),
        _ => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("API error {status}: {body}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str, model: Option<&str>) -> LlmSettings {
        LlmSettings {
            provider: provider.to_string(),
            default_model: model.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_anthropic_provider() {
        let config = LlmConfig::with_key(
            &settings("anthropic", Some("claude-test")),
            LlmBackend::Anthropic,
            SecretString::from("test-key"),
        );
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-test");
    }

    #[test]
    fn test_create_openai_provider_default_model() {
        let config = LlmConfig::with_key(
            &settings("openai", None),
            LlmBackend::OpenAi,
            SecretString::from("sk-test"),
        );
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = "mistral".parse::<LlmBackend>().unwrap_err();
        assert!(matches!(err, LlmError::UnsupportedProvider(p) if p == "mistral"));
        assert!(LlmConfig::from_settings(&settings("mistral", None)).is_err());
    }

    #[test]
    fn test_create_google_provider() {
        assert_eq!("gemini".parse::<LlmBackend>().unwrap(), LlmBackend::Google);
        let config = LlmConfig::with_key(
            &settings("google", None),
            LlmBackend::Google,
            SecretString::from("g-test"),
        );
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gemini-1.5-flash");
    }

    #[test]
    fn provider_model_overrides_default_model() {
        let mut s = settings("anthropic", Some("shared-model"));
        s.provider_models
            .insert("anthropic".to_string(), "claude-pinned".to_string());
        s.provider_models
            .insert("openai".to_string(), "gpt-pinned".to_string());

        let anthropic = LlmConfig::with_key(&s, LlmBackend::Anthropic, SecretString::from("k"));
        assert_eq!(anthropic.model, "claude-pinned");

        let google = LlmConfig::with_key(&s, LlmBackend::Google, SecretString::from("k"));
        assert_eq!(google.model, "shared-model");
    }

    #[test]
    fn status_mapping() {
        let body = serde_json::json!({});
        assert!(matches!(
            status_error("openai", reqwest::StatusCode::TOO_MANY_REQUESTS, &body),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error("openai", reqwest::StatusCode::UNAUTHORIZED, &body),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            status_error("openai", reqwest::StatusCode::BAD_GATEWAY, &body),
            LlmError::Unavailable(_)
        ));
    }
}
