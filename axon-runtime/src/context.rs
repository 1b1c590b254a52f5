//! Run contexts — the per-node handle workers use to spawn children, poll
//! cancellation, and reach session storage.
//!
//! A context is wired immediately after node creation with the three
//! session bags its scopes resolve to, so lookups never walk the tree at
//! call time. The context returned by `Runtime::get_ctx` is unbound (no
//! node) and exists to launch top-level invocations.

use crate::node::Node;
use crate::session::{SessionBag, SessionValue};
use crate::spec::FuncSpec;
use crate::{NodeId, Runtime};
use axon_types::{AxonError, Provider};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which session bag a `get_or_put` resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionScope {
    /// The node's own bag.
    Own,
    /// The immediate parent's bag. Fails with
    /// [`AxonError::NoParentSession`] on a root.
    Parent,
    /// The bag of the node's root ancestor (the node itself on a root).
    TopLevel,
}

/// Per-invocation options for [`RunContext::invoke_with`].
#[derive(Default, Clone)]
pub struct InvokeOptions {
    /// Provider override; only valid for agent specifications.
    pub provider: Option<Provider>,
    /// Distinct cancellation token for the child. It is linked one-way:
    /// cancellation of the caller also cancels the child, but not the
    /// reverse. Without this, the child shares the caller's token.
    pub cancel: Option<CancellationToken>,
}

#[derive(Clone)]
pub(crate) struct SessionBags {
    pub(crate) own: Arc<SessionBag>,
    pub(crate) parent: Option<Arc<SessionBag>>,
    pub(crate) top_level: Arc<SessionBag>,
}

#[derive(Clone)]
pub(crate) struct NodeBinding {
    pub(crate) id: NodeId,
    pub(crate) cancel: CancellationToken,
    pub(crate) bags: SessionBags,
}

/// Handle a unit uses to interact with the runtime that is executing it.
#[derive(Clone)]
pub struct RunContext {
    pub(crate) rt: Arc<Runtime>,
    pub(crate) binding: Option<NodeBinding>,
}

impl RunContext {
    pub(crate) fn unbound(rt: Arc<Runtime>) -> Self {
        Self { rt, binding: None }
    }

    pub(crate) fn bound(rt: Arc<Runtime>, binding: NodeBinding) -> Self {
        Self {
            rt,
            binding: Some(binding),
        }
    }

    /// Id of the node this context is bound to, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        self.binding.as_ref().map(|b| b.id)
    }

    /// Spawn a child node for `spec` with the given JSON inputs and return
    /// its handle without waiting for completion.
    pub fn invoke(&self, spec: &Arc<FuncSpec>, inputs: Value) -> Result<Node, AxonError> {
        self.invoke_with(spec, inputs, InvokeOptions::default())
    }

    /// [`invoke`](Self::invoke) with a provider override or a distinct
    /// cancellation token.
    pub fn invoke_with(
        &self,
        spec: &Arc<FuncSpec>,
        inputs: Value,
        opts: InvokeOptions,
    ) -> Result<Node, AxonError> {
        self.rt
            .invoke_internal(self.node_id(), spec, &inputs, opts)
    }

    /// Whether cancellation has been requested for this node. Workers poll
    /// this at safe points and surface [`AxonError::Canceled`].
    pub fn cancel_requested(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.cancel.is_cancelled())
    }

    /// Request cancellation of this node and everything sharing or linked
    /// below its token. No-op on an unbound context.
    pub fn request_cancel(&self) {
        if let Some(binding) = &self.binding {
            binding.cancel.cancel();
        }
    }

    /// This node's cancellation token, for select-based waits inside
    /// long-running code units. `None` on an unbound context.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.binding.as_ref().map(|b| b.cancel.clone())
    }

    /// Fetch or create a shared object in the bag selected by `scope`.
    /// The factory runs at most once per `(bag, namespace, key)` across
    /// concurrent callers.
    pub async fn get_or_put<F, Fut>(
        &self,
        scope: SessionScope,
        namespace: &str,
        key: &str,
        factory: F,
    ) -> Result<SessionValue, AxonError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SessionValue>,
    {
        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| AxonError::message("session bags are only available on a node-bound context"))?;
        let bag = match scope {
            SessionScope::Own => binding.bags.own.clone(),
            SessionScope::TopLevel => binding.bags.top_level.clone(),
            SessionScope::Parent => binding
                .bags
                .parent
                .clone()
                .ok_or(AxonError::NoParentSession)?,
        };
        Ok(bag.get_or_put(namespace, key, factory).await)
    }
}
