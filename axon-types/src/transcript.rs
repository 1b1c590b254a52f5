//! Transcript model — the observer-visible record of an agent interaction.
//!
//! A transcript is an ordered, append-only sequence of tagged parts owned
//! by one node's worker. It is distinct from the provider-native replay
//! conversation an adapter keeps for prompt continuation: the transcript is
//! what watchers read, the replay is what the backend re-consumes. The two
//! are appended in lockstep by the agent loop.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One entry in a node's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptPart {
    /// The initial prompt, after template substitution.
    UserText {
        /// Substituted prompt text.
        text: String,
    },
    /// The final assistant message.
    ModelText {
        /// Assistant text.
        text: String,
    },
    /// A reasoning marker. Content may be empty when the backend hides
    /// reasoning text; the signature is always kept so the chain can be
    /// re-linked across tool cycles.
    Reasoning {
        /// Reasoning text, possibly empty.
        content: String,
        /// Whether the backend redacted the content.
        #[serde(default)]
        redacted: bool,
        /// Opaque continuity token, if the backend issued one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        /// Backend-issued id pairing this request with its result.
        tool_use_id: String,
        /// Requested tool name.
        tool_name: String,
        /// Raw argument mapping as the model produced it.
        args: serde_json::Value,
    },
    /// The outcome of a tool invocation.
    ToolResult {
        /// Id of the paired [`TranscriptPart::ToolUse`].
        tool_use_id: String,
        /// Tool name, repeated for readability.
        tool_name: String,
        /// Stringified tool output or error text.
        output: String,
        /// Whether the tool failed.
        is_error: bool,
    },
}

/// Append-only transcript store. Cheap to clone; the worker appends,
/// readers take snapshots.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    parts: Arc<Mutex<Vec<TranscriptPart>>>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one part.
    pub fn push(&self, part: TranscriptPart) {
        self.parts
            .lock()
            .expect("transcript mutex poisoned")
            .push(part);
    }

    /// Copy the current parts. The returned prefix is stable: published
    /// parts are never mutated or removed.
    pub fn snapshot(&self) -> Vec<TranscriptPart> {
        self.parts
            .lock()
            .expect("transcript mutex poisoned")
            .clone()
    }

    /// Number of parts appended so far.
    pub fn len(&self) -> usize {
        self.parts.lock().expect("transcript mutex poisoned").len()
    }

    /// Whether nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
