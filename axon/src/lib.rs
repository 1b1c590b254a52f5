#![deny(missing_docs)]
//! # axon — umbrella crate
//!
//! A hierarchical execution runtime for two unit kinds: deterministic code
//! functions and LLM agents running a tool-calling loop against a provider
//! backend. Each tool invocation is itself a node in an execution tree
//! with uniform lifecycle, observable immutable snapshots, session-scoped
//! storage, and cooperative cancellation.
//!
//! This crate re-exports the member crates and provides a [`prelude`] for
//! the happy path, plus [`format_tree`] for quick textual views of an
//! execution tree.

pub use axon_provider_anthropic;
pub use axon_runtime;
pub use axon_tools;
pub use axon_types;

mod tree;

pub use tree::format_tree;

/// Happy-path imports for composing axon systems.
pub mod prelude {
    pub use axon_provider_anthropic::{AnthropicBackendFactory, AnthropicClient};
    pub use axon_runtime::{
        ABORT_TOOL, FuncSpec, InvokeOptions, Node, NodeState, NodeView, RunContext, Runtime,
        SessionScope, abort_tool,
    };
    pub use axon_types::{
        ArgSpec, ArgType, ArgValue, Args, AxonError, Provider, ProviderClient, TokenUsage,
        Transcript, TranscriptPart,
    };

    pub use crate::format_tree;
}
