//! [`AgentBackend`] implementation over the Messages API.
//!
//! The backend owns the replay conversation as native Messages API JSON.
//! Assistant replies are appended verbatim — thinking blocks and their
//! signatures included — and each turn's tool results aggregate into a
//! single user message, so reasoning stays chained across tool cycles.

use crate::client::AnthropicClient;
use crate::mapping::{parse_response, request_body, tool_results_message, tool_schema};
use async_trait::async_trait;
use axon_types::{
    AgentBackend, BackendConfig, BackendFactory, ModelTurn, Provider, ProviderClient,
    ProviderError, TokenUsage, ToolOutcome,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Factory registered with the runtime for [`Provider::Anthropic`].
pub struct AnthropicBackendFactory;

impl AnthropicBackendFactory {
    /// The factory as a trait object, ready for
    /// `RuntimeBuilder::backend(...)`.
    pub fn shared() -> Arc<dyn BackendFactory> {
        Arc::new(AnthropicBackendFactory)
    }
}

impl BackendFactory for AnthropicBackendFactory {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn make(
        &self,
        client: ProviderClient,
        config: BackendConfig,
    ) -> Result<Box<dyn AgentBackend>, ProviderError> {
        let client = client.downcast::<AnthropicClient>().map_err(|_| {
            ProviderError::ClientMismatch(
                "the client factory registered for Anthropic did not produce an AnthropicClient"
                    .into(),
            )
        })?;
        Ok(Box::new(AnthropicBackend::new(client, config)))
    }
}

struct AnthropicBackend {
    client: Arc<AnthropicClient>,
    system: String,
    tools: Vec<Value>,
    messages: Vec<Value>,
    usage: TokenUsage,
}

impl AnthropicBackend {
    fn new(client: Arc<AnthropicClient>, config: BackendConfig) -> Self {
        let tools = config.tools.iter().map(tool_schema).collect();
        let messages = vec![json!({
            "role": "user",
            "content": [{"type": "text", "text": config.user_text}],
        })];
        Self {
            client,
            system: config.system_prompt,
            tools,
            messages,
            usage: TokenUsage::default(),
        }
    }
}

#[async_trait]
impl AgentBackend for AnthropicBackend {
    async fn step(&mut self) -> Result<ModelTurn, ProviderError> {
        let body = request_body(
            &self.client.model,
            &self.system,
            &self.messages,
            &self.tools,
            self.client.max_tokens,
            self.client.thinking_budget,
        );
        let response = self.client.post_messages(&body).await?;
        let parsed = parse_response(&response)?;

        self.usage.add(&parsed.usage);
        // The assistant message joins the replay even on the final turn.
        self.messages.push(json!({
            "role": "assistant",
            "content": parsed.assistant_content,
        }));
        Ok(parsed.turn)
    }

    fn record_results(&mut self, results: &[ToolOutcome]) {
        self.messages.push(tool_results_message(results));
    }

    fn usage(&self) -> TokenUsage {
        self.usage.clone()
    }
}
