#![deny(missing_docs)]
//! # axon-provider-anthropic — Anthropic backend for the axon agent loop
//!
//! Implements [`axon_types::AgentBackend`] over the Anthropic Messages API,
//! driving a manual tool-call loop (never a server-side tool-execution
//! facility). Extended thinking is supported: thinking blocks and their
//! signatures are parsed into reasoning markers for the transcript and
//! echoed back verbatim in the replay conversation, which the API requires
//! to keep reasoning chained across tool cycles.
//!
//! Wiring:
//!
//! ```no_run
//! use axon_provider_anthropic::{AnthropicBackendFactory, AnthropicClient};
//! use axon_runtime::Runtime;
//! use axon_types::Provider;
//! use std::sync::Arc;
//!
//! # fn wiring() -> Result<(), axon_types::AxonError> {
//! let api_key = std::env::var("ANTHROPIC_API_KEY").expect("key");
//! let rt = Runtime::builder()
//!     .backend(AnthropicBackendFactory::shared())
//!     .client_factory(Provider::Anthropic, move || {
//!         Arc::new(AnthropicClient::new(api_key.clone())) as axon_types::ProviderClient
//!     })
//!     .build()?;
//! # let _ = rt;
//! # Ok(())
//! # }
//! ```

mod backend;
mod client;
mod error;
mod mapping;

pub use backend::AnthropicBackendFactory;
pub use client::AnthropicClient;
