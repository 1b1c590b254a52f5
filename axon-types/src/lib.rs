#![deny(missing_docs)]
//! # axon-types — protocol types for the axon execution runtime
//!
//! axon orchestrates trees of two unit kinds: deterministic code functions
//! and LLM agents running a tool-calling loop. This crate holds the types
//! shared across the workspace:
//!
//! - the scalar [argument schema](arg) with validate-and-coerce semantics,
//! - the [transcript model](transcript) watchers read,
//! - [token usage](usage) accounting,
//! - [provider tags and client factories](provider),
//! - the [`AgentBackend`] contract every provider adapter implements,
//! - the [error taxonomy](error).
//!
//! The scheduler, nodes, and run contexts live in `axon-runtime`; concrete
//! adapters live in their own `axon-provider-*` crates.

pub mod arg;
pub mod backend;
pub mod error;
pub mod provider;
pub mod transcript;
pub mod usage;

// Re-exports for convenience
pub use arg::{ArgSpec, ArgType, ArgValue, Args, validate_coerce};
pub use backend::{
    AgentBackend, BackendConfig, BackendFactory, ModelTurn, ReasoningBlock, ToolCallRequest,
    ToolDecl, ToolOutcome,
};
pub use error::{AxonError, ProviderError};
pub use provider::{ClientFactory, Provider, ProviderClient};
pub use transcript::{Transcript, TranscriptPart};
pub use usage::TokenUsage;
