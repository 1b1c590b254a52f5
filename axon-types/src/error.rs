//! Error taxonomy shared by the runtime, adapters, and tools.
//!
//! [`AxonError`] is the externally visible taxonomy. It is `Clone`: a node's
//! terminal error is shared between the runtime's node table, every
//! published node view snapshot, and each `result()` caller, so inner
//! causes are `Arc`-wrapped rather than boxed.

use crate::provider::Provider;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by units, the runtime, and provider adapters.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum AxonError {
    /// Invalid inputs to a specification or a tool spawn. Lists every
    /// offending field.
    #[error("invalid arguments for '{spec}': {}", issues.join("; "))]
    ArgumentValidation {
        /// Name of the specification being invoked.
        spec: String,
        /// One entry per offending field.
        issues: Vec<String>,
    },

    /// A specification failed construction-time validation.
    #[error("invalid specification: {0}")]
    InvalidSpec(String),

    /// Registry-level failure: duplicate names, unregistered or
    /// mismatched specification instances, missing provider wiring.
    #[error("registration error: {0}")]
    Registration(String),

    /// The model referenced a tool name outside the agent's declared set.
    #[error("unknown tool '{tool}'; declared tools: [{}]", available.join(", "))]
    UnknownTool {
        /// The name the model asked for.
        tool: String,
        /// The names the agent actually declares.
        available: Vec<String>,
    },

    /// A provider-SDK-originated failure, wrapped with the provider tag and
    /// the agent specification it occurred in.
    #[error("provider {provider} failed in agent '{agent}': {source}")]
    ModelProvider {
        /// Backend the failure came from.
        provider: Provider,
        /// Agent specification that was running.
        agent: String,
        /// The inner provider failure.
        source: Arc<ProviderError>,
    },

    /// The unit observed cancellation at a safe point.
    #[error("operation canceled")]
    Canceled,

    /// An agent terminated its own task through the reserved abort tool.
    #[error("agent aborted: {message}")]
    AgentAbort {
        /// Structured message supplied by the agent.
        message: String,
    },

    /// The agent loop reached its cycle cap without a final answer.
    #[error("tool loop exhausted after {cycles} cycles without a final answer")]
    ToolLoopExhausted {
        /// The cap that was hit.
        cycles: u32,
    },

    /// Parent-scoped session access on a root node.
    #[error("node has no parent session")]
    NoParentSession,

    /// Anything propagated as-is from user code.
    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl AxonError {
    /// Wrap an arbitrary error from user code.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AxonError::Other(Arc::new(err))
    }

    /// Wrap a plain message as an [`AxonError::Other`].
    pub fn message(msg: impl Into<String>) -> Self {
        AxonError::Other(Arc::new(MessageError(msg.into())))
    }

    /// Whether this error maps to the terminal `Canceled` state.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AxonError::Canceled)
    }
}

/// A bare-message error used by [`AxonError::message`].
#[derive(Debug)]
struct MessageError(String);

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}

/// Failures originating in a model provider backend.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication or authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A client factory produced a client the adapter cannot use.
    #[error("client mismatch: {0}")]
    ClientMismatch(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::RequestFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_validation_lists_issues() {
        let err = AxonError::ArgumentValidation {
            spec: "double".into(),
            issues: vec!["missing required argument 'x'".into(), "unknown argument 'y'".into()],
        };
        let text = err.to_string();
        assert!(text.contains("double"));
        assert!(text.contains("'x'"));
        assert!(text.contains("'y'"));
    }

    #[test]
    fn unknown_tool_names_the_tool() {
        let err = AxonError::UnknownTool {
            tool: "ghost".into(),
            available: vec!["echo".into()],
        };
        assert!(err.to_string().contains("ghost"));
        assert!(err.to_string().contains("echo"));
    }

    #[test]
    fn model_provider_wraps_cause() {
        let err = AxonError::ModelProvider {
            provider: Provider::Anthropic,
            agent: "AgentA".into(),
            source: Arc::new(ProviderError::RateLimited),
        };
        let text = err.to_string();
        assert!(text.contains("Anthropic"));
        assert!(text.contains("AgentA"));
        assert!(text.contains("rate limited"));
    }

    #[test]
    fn provider_error_retryable() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::RequestFailed("timeout".into()).is_retryable());
        assert!(!ProviderError::AuthFailed("bad key".into()).is_retryable());
        assert!(!ProviderError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn errors_are_clonable() {
        let err = AxonError::message("boom");
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
