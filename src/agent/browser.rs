//! Browser automation agent backed by a WebDriver session.
//!
//! The session is opened lazily on the first task and closed by
//! [`AgentBehavior::release`]. The WebDriver client is only compiled with
//! the `browser` feature; without it every task fails with a clear message.

use async_trait::async_trait;
use tracing::info;

use super::behavior::{AgentBehavior, AgentContext, TaskDetails, detail_str, truncate_chars};
use crate::error::AgentError;

/// Maximum characters returned from page content.
pub const MAX_CONTENT_CHARS: usize = 5000;

/// Supported actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    GetContent { prompt: Option<String> },
    ScrapeText { selector: String },
    Click { selector: String },
    Screenshot { filename: String },
}

impl BrowserAction {
    pub fn parse(details: &TaskDetails, agent_id: &str) -> Result<Self, AgentError> {
        let selector = detail_str(details, "selector").map(str::to_string);
        match detail_str(details, "action").unwrap_or("get_content") {
            "get_content" => Ok(Self::GetContent {
                prompt: detail_str(details, "prompt").map(str::to_string),
            }),
            "scrape_text" => Ok(Self::ScrapeText {
                selector: selector.unwrap_or_else(|| "body".to_string()),
            }),
            "click" => selector
                .map(|selector| Self::Click { selector })
                .ok_or_else(|| AgentError::InvalidTask("missing 'selector' for click".into())),
            "screenshot" => Ok(Self::Screenshot {
                filename: detail_str(details, "filename")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{agent_id}_screenshot.png")),
            }),
            other => Err(AgentError::InvalidTask(format!(
                "unknown browser action '{other}'"
            ))),
        }
    }
}

/// Cap page output at [`MAX_CONTENT_CHARS`].
pub fn truncate_content(content: &str) -> String {
    if content.chars().count() > MAX_CONTENT_CHARS {
        format!("{}... (truncated)", truncate_chars(content, MAX_CONTENT_CHARS))
    } else {
        content.to_string()
    }
}

pub struct BrowserAgent {
    #[cfg(feature = "browser")]
    client: tokio::sync::Mutex<Option<fantoccini::Client>>,
}

impl BrowserAgent {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "browser")]
            client: tokio::sync::Mutex::new(None),
        }
    }
}

impl Default for BrowserAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "browser")]
mod driver {
    use fantoccini::{ClientBuilder, Locator};
    use tracing::{debug, info};

    use super::{BrowserAction, truncate_content};
    use crate::agent::behavior::AgentContext;
    use crate::error::AgentError;
    use crate::llm::GenerateRequest;

    fn browser_err(context: &str, e: impl std::fmt::Display) -> AgentError {
        AgentError::Browser(format!("{context}: {e}"))
    }

    pub(super) async fn connect(ctx: &AgentContext) -> Result<fantoccini::Client, AgentError> {
        let config = &ctx.config.browser;
        let mut caps = serde_json::Map::new();
        if config.headless {
            let args = serde_json::json!(["--headless", "--disable-gpu", "--no-sandbox"]);
            caps.insert(
                "goog:chromeOptions".to_string(),
                serde_json::json!({ "args": args }),
            );
            caps.insert(
                "moz:firefoxOptions".to_string(),
                serde_json::json!({ "args": ["-headless"] }),
            );
        }

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| browser_err(&format!("connect to WebDriver at {}", config.webdriver_url), e))?;
        info!(agent_id = %ctx.agent_id, webdriver_url = %config.webdriver_url, "Browser session opened");
        Ok(client)
    }

    pub(super) async fn perform(
        client: &fantoccini::Client,
        ctx: &AgentContext,
        url: &str,
        action: &BrowserAction,
    ) -> Result<String, AgentError> {
        debug!(agent_id = %ctx.agent_id, url, "Navigating");
        client
            .goto(url)
            .await
            .map_err(|e| browser_err(&format!("navigate to {url}"), e))?;

        match action {
            BrowserAction::GetContent { prompt } => {
                let content = client
                    .source()
                    .await
                    .map_err(|e| browser_err("read page source", e))?;
                match (prompt, &ctx.llm) {
                    (Some(prompt), Some(llm)) => {
                        let excerpt: String = content.chars().take(3000).collect();
                        let request = GenerateRequest::new(format!(
                            "Extract the key information related to '{prompt}' from the following HTML content:\n\n{excerpt}..."
                        ))
                        .with_max_tokens(500);
                        Ok(llm.generate_text(request).await?)
                    }
                    _ => Ok(truncate_content(&content)),
                }
            }
            BrowserAction::ScrapeText { selector } => {
                let element = client
                    .find(Locator::Css(selector))
                    .await
                    .map_err(|e| browser_err(&format!("find '{selector}'"), e))?;
                let text = element
                    .text()
                    .await
                    .map_err(|e| browser_err(&format!("read text of '{selector}'"), e))?;
                Ok(truncate_content(text.trim()))
            }
            BrowserAction::Click { selector } => {
                let element = client
                    .find(Locator::Css(selector))
                    .await
                    .map_err(|e| browser_err(&format!("find '{selector}'"), e))?;
                element
                    .click()
                    .await
                    .map_err(|e| browser_err(&format!("click '{selector}'"), e))?;
                let current = client
                    .current_url()
                    .await
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| url.to_string());
                Ok(format!(
                    "Clicked element '{selector}' on {url}. Current URL: {current}"
                ))
            }
            BrowserAction::Screenshot { filename } => {
                let png = client
                    .screenshot()
                    .await
                    .map_err(|e| browser_err("screenshot", e))?;
                tokio::fs::write(filename, &png).await?;
                Ok(format!("Screenshot saved to {filename}"))
            }
        }
    }
}

#[async_trait]
impl AgentBehavior for BrowserAgent {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        details: &TaskDetails,
    ) -> Result<String, AgentError> {
        let url = detail_str(details, "url")
            .ok_or_else(|| AgentError::InvalidTask("missing 'url'".into()))?;
        let action = BrowserAction::parse(details, &ctx.agent_id)?;
        info!(agent_id = %ctx.agent_id, url, action = ?action, "Browser task");

        #[cfg(feature = "browser")]
        {
            let mut guard = self.client.lock().await;
            if guard.is_none() {
                *guard = Some(driver::connect(ctx).await?);
            }
            let client = guard
                .as_ref()
                .ok_or_else(|| AgentError::Browser("session missing after connect".into()))?;
            driver::perform(client, ctx, url, &action).await
        }

        #[cfg(not(feature = "browser"))]
        {
            Err(AgentError::Browser(
                "browser automation requires the 'browser' feature".into(),
            ))
        }
    }

    fn holds_resources(&self) -> bool {
        true
    }

    async fn release(&self, ctx: &AgentContext) -> Result<(), AgentError> {
        #[cfg(feature = "browser")]
        {
            let client = self.client.lock().await.take();
            if let Some(client) = client {
                client
                    .close()
                    .await
                    .map_err(|e| AgentError::Browser(format!("close session: {e}")))?;
                info!(agent_id = %ctx.agent_id, "Browser session closed");
            }
        }
        #[cfg(not(feature = "browser"))]
        tracing::debug!(agent_id = %ctx.agent_id, "No browser session to release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(v: serde_json::Value) -> TaskDetails {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn default_action_is_get_content() {
        let action = BrowserAction::parse(&details(json!({"url": "https://x"})), "b-1").unwrap();
        assert_eq!(action, BrowserAction::GetContent { prompt: None });
    }

    #[test]
    fn scrape_defaults_to_body() {
        let action =
            BrowserAction::parse(&details(json!({"action": "scrape_text"})), "b-1").unwrap();
        assert_eq!(
            action,
            BrowserAction::ScrapeText {
                selector: "body".into()
            }
        );
    }

    #[test]
    fn click_requires_selector() {
        let err = BrowserAction::parse(&details(json!({"action": "click"})), "b-1").unwrap_err();
        assert!(matches!(err, AgentError::InvalidTask(_)));
    }

    #[test]
    fn screenshot_default_filename() {
        let action =
            BrowserAction::parse(&details(json!({"action": "screenshot"})), "browser-1").unwrap();
        assert_eq!(
            action,
            BrowserAction::Screenshot {
                filename: "browser-1_screenshot.png".into()
            }
        );
    }

    #[test]
    fn unknown_action_rejected() {
        let err = BrowserAction::parse(&details(json!({"action": "hover"})), "b-1").unwrap_err();
        assert!(matches!(err, AgentError::InvalidTask(m) if m.contains("hover")));
    }

    #[test]
    fn content_truncated() {
        let long = "a".repeat(MAX_CONTENT_CHARS + 10);
        let out = truncate_content(&long);
        assert!(out.ends_with("... (truncated)"));
        assert_eq!(out.chars().count(), MAX_CONTENT_CHARS + "... (truncated)".len());
        assert_eq!(truncate_content("short"), "short");
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn without_feature_tasks_fail_clearly() {
        use crate::config::AgentsConfig;
        use crate::memory::MemoryStore;
        use std::sync::Arc;

        let ctx = AgentContext {
            agent_id: "browser-1".into(),
            llm: None,
            memory: Arc::new(MemoryStore::short_term_only()),
            config: Arc::new(AgentsConfig::default()),
        };
        let agent = BrowserAgent::new();
        let err = agent
            .process_task(&ctx, &details(json!({"url": "https://example.com"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Browser(m) if m.contains("feature")));
        assert!(agent.holds_resources());
        assert!(agent.release(&ctx).await.is_ok());
    }
}
