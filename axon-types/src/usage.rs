//! Token accounting accumulated across an agent's model calls.

use serde::{Deserialize, Serialize};

/// Cumulative token usage for one agent node, updated from each provider
/// usage report. Output splits are optional because not every backend
/// reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// All input tokens, cached and uncached.
    pub input_tokens_total: u64,
    /// Input tokens actually processed (not served from cache).
    pub input_tokens_regular: u64,
    /// Input tokens served from the provider's prompt cache.
    pub input_tokens_cache_read: u64,
    /// All output tokens.
    pub output_tokens_total: u64,
    /// Output tokens attributed to visible text, if reported.
    pub output_tokens_text: Option<u64>,
    /// Output tokens attributed to reasoning, if reported.
    pub output_tokens_reasoning: Option<u64>,
}

impl TokenUsage {
    /// Fold another usage report into this one. Optional splits combine
    /// only when at least one side reports them.
    pub fn add(&mut self, delta: &TokenUsage) {
        self.input_tokens_total = self.input_tokens_total.saturating_add(delta.input_tokens_total);
        self.input_tokens_regular = self
            .input_tokens_regular
            .saturating_add(delta.input_tokens_regular);
        self.input_tokens_cache_read = self
            .input_tokens_cache_read
            .saturating_add(delta.input_tokens_cache_read);
        self.output_tokens_total = self
            .output_tokens_total
            .saturating_add(delta.output_tokens_total);
        self.output_tokens_text = add_opt(self.output_tokens_text, delta.output_tokens_text);
        self.output_tokens_reasoning =
            add_opt(self.output_tokens_reasoning, delta.output_tokens_reasoning);
    }
}

fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
    }
}
