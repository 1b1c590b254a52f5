//! Provider tags and client factories.
//!
//! The runtime never constructs SDK clients itself: callers register one
//! [`ClientFactory`] per provider, and the matching adapter calls it on
//! first use. Factories return type-erased clients; the adapter's downcast
//! is where the concrete client type is checked.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Tag identifying a model provider backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Responses API.
    OpenAi,
    /// Google Gemini.
    Gemini,
    /// xAI Grok.
    XAi,
}

impl Provider {
    /// The flagship model this framework targets per provider.
    pub fn model_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-opus-4-1-20250805",
            Provider::OpenAi => "gpt-5-2025-08-07",
            Provider::Gemini => "gemini-2.5-pro",
            Provider::XAi => "grok-4",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Anthropic => "Anthropic",
            Provider::OpenAi => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::XAi => "xAI",
        };
        f.write_str(s)
    }
}

/// A type-erased provider SDK client, shared across an agent's cycles.
pub type ProviderClient = Arc<dyn Any + Send + Sync>;

/// Factory producing a provider client on demand.
pub type ClientFactory = Arc<dyn Fn() -> ProviderClient + Send + Sync>;
