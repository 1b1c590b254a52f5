//! Anthropic API client struct and builder.

use axon_types::ProviderError;

use crate::error::{map_http_status, map_reqwest_error};

/// Default model used when the builder does not override it.
const DEFAULT_MODEL: &str = "claude-opus-4-1-20250805";

/// Default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default max output tokens per model call.
const DEFAULT_MAX_TOKENS: u32 = 16_384;

/// Default extended-thinking budget.
const DEFAULT_THINKING_BUDGET: u32 = 8_192;

/// Client for the Anthropic Messages API.
///
/// Register it through a runtime client factory:
///
/// ```no_run
/// use axon_provider_anthropic::AnthropicClient;
/// use std::sync::Arc;
///
/// let factory = move || {
///     Arc::new(AnthropicClient::new("sk-ant-...")) as axon_types::ProviderClient
/// };
/// # let _ = factory;
/// ```
pub struct AnthropicClient {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) max_tokens: u32,
    pub(crate) thinking_budget: Option<u32>,
    pub(crate) http: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client with the given API key and defaults:
    /// flagship model, production base URL, extended thinking enabled.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget: Some(DEFAULT_THINKING_BUDGET),
            http: reqwest::Client::new(),
        }
    }

    /// Override the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL. Useful for testing with a local mock
    /// server or an API proxy.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the max output tokens per call.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the extended-thinking budget, or disable thinking with `None`.
    #[must_use]
    pub fn thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Build the messages endpoint URL.
    pub(crate) fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// POST a request body to the messages endpoint and return the parsed
    /// JSON reply.
    pub(crate) async fn post_messages(
        &self,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = self.messages_url();
        tracing::debug!(url = %url, model = %body["model"], "sending completion request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid JSON response: {e}")))
    }
}
