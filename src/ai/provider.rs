//! External feedback provider boundary.

use async_trait::async_trait;
use serde_json::json;

use crate::error::ProviderError;

/// A text-generation backend used for best-effort enrichment. May fail or
/// time out; every caller wraps it in the default-fallback tiers.
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Provider settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// `PODIUM_AI_URL` selects the endpoint; without it the provider is
    /// disabled and analysis falls back to defaults.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PODIUM_AI_URL").ok()?;
        let timeout_secs = std::env::var("PODIUM_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);

        Some(ProviderConfig {
            base_url,
            api_key: std::env::var("PODIUM_AI_KEY").ok(),
            model: std::env::var("PODIUM_AI_MODEL").unwrap_or_else(|_| "default".to_string()),
            timeout_secs,
        })
    }
}

/// Chat-completions style HTTP provider.
pub struct HttpFeedbackProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpFeedbackProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl FeedbackProvider for HttpFeedbackProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut request = self.client.post(&self.config.base_url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let value: serde_json::Value = response.json().await?;

        let text = value
            .pointer("/choices/0/message/content")
            .or_else(|| value.pointer("/content"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text.to_string())
    }
}

/// Stand-in when no provider is configured. Always fails, which the
/// orchestrator converts into the default analysis.
pub struct DisabledProvider;

#[async_trait]
impl FeedbackProvider for DisabledProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable(
            "no feedback provider configured".to_string(),
        ))
    }
}
