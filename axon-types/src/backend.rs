//! The adapter contract between the agent loop and a provider backend.
//!
//! The loop itself — spawning tool children, transcripting, cancellation,
//! the cycle cap — is provider-agnostic and lives in the runtime. What
//! varies per backend is hidden behind [`AgentBackend`]: how tools are
//! declared, how the model is called, how its reply parses into reasoning /
//! text / tool requests, and how tool results are replayed. The backend
//! owns the provider-native replay conversation; it never touches the
//! shared node. Backends must drive the model manually and never rely on a
//! provider's automatic tool-execution facility.

use crate::arg::ArgSpec;
use crate::error::ProviderError;
use crate::provider::{Provider, ProviderClient};
use crate::usage::TokenUsage;
use async_trait::async_trait;

/// Tool surface handed to a backend: the flattened projection of one tool
/// specification, enough to build the backend's schema type.
#[derive(Debug, Clone)]
pub struct ToolDecl {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared argument fields, in order.
    pub args: Vec<ArgSpec>,
}

/// Everything a backend needs at construction time.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Name of the agent specification, for diagnostics.
    pub agent_name: String,
    /// System prompt.
    pub system_prompt: String,
    /// User prompt after template substitution; seeds the replay.
    pub user_text: String,
    /// Declared tools, in declaration order.
    pub tools: Vec<ToolDecl>,
}

/// One reasoning marker parsed from a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningBlock {
    /// Reasoning text; empty when the backend hides it.
    pub content: String,
    /// Whether the backend redacted the content.
    pub redacted: bool,
    /// Opaque continuity token, preserved verbatim.
    pub signature: Option<String>,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Backend-issued id pairing the request with its result.
    pub tool_use_id: String,
    /// Requested tool name.
    pub tool_name: String,
    /// Raw argument object as the model produced it.
    pub args: serde_json::Value,
}

/// The parsed outcome of one model call.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Reasoning markers, in reply order.
    pub reasoning: Vec<ReasoningBlock>,
    /// Assistant text. Meaningful as the final answer when `tool_calls`
    /// is empty.
    pub text: String,
    /// Tool invocations requested this turn, in request order.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelTurn {
    /// Whether this turn ends the loop (no tool requests).
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Outcome of one tool child, fed back into the replay conversation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Id of the originating tool request.
    pub tool_use_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Stringified output or error text.
    pub output: String,
    /// Whether the tool failed.
    pub is_error: bool,
}

/// Provider-specialized half of the agent loop.
///
/// One backend instance serves one agent node: it accumulates the replay
/// conversation across [`step`](AgentBackend::step) calls so reasoning
/// signatures stay chained for backends that demand it.
#[async_trait]
pub trait AgentBackend: Send {
    /// Call the model once over the accumulated conversation and parse the
    /// reply. The backend appends the model message to its replay before
    /// returning.
    async fn step(&mut self) -> Result<ModelTurn, ProviderError>;

    /// Append this turn's aggregated tool outcomes to the replay
    /// conversation, in request order.
    fn record_results(&mut self, results: &[ToolOutcome]);

    /// Cumulative token usage across all steps so far.
    fn usage(&self) -> TokenUsage;
}

/// Constructor for [`AgentBackend`] instances, registered per provider.
pub trait BackendFactory: Send + Sync {
    /// The provider this factory serves.
    fn provider(&self) -> Provider;

    /// Build a backend for one agent node. `client` comes from the
    /// registered [`ClientFactory`](crate::provider::ClientFactory); the
    /// factory downcasts it to its concrete client type, and a mismatch is
    /// a [`ProviderError::ClientMismatch`].
    fn make(
        &self,
        client: ProviderClient,
        config: BackendConfig,
    ) -> Result<Box<dyn AgentBackend>, ProviderError>;
}
