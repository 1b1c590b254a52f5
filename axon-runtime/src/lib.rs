#![deny(missing_docs)]
//! # axon-runtime — scheduler and registry for hierarchical executions
//!
//! The [`Runtime`] owns everything mutable: the registered specifications,
//! the node table (an id arena whose entries own the child lists), the
//! monotonically increasing global sequence number, and one observable per
//! node. Units run as detached tokio tasks; parents await children through
//! per-node done signals; watchers receive consistent immutable
//! [`NodeView`] snapshots through per-node `watch` channels that are
//! published under the same lock that bumps the sequence number, so no
//! update is ever lost and any snapshot corresponds to a prefix of the
//! mutation stream.
//!
//! Cancellation is cooperative: tokens are level-triggered
//! `CancellationToken`s shared down the tree by default; workers poll at
//! safe points and surface `Canceled`, which the lifecycle machinery maps
//! to the terminal `Canceled` state.

mod agent;
pub mod context;
pub mod node;
pub mod session;
pub mod spec;

pub use agent::MAX_AGENT_CYCLES;
pub use context::{InvokeOptions, RunContext, SessionScope};
pub use node::{Node, NodeState, NodeView};
pub use session::{SessionBag, SessionValue};
pub use spec::{
    ABORT_TOOL, AgentDetail, AgentSpecBuilder, CodeCallable, CodeFuture, CodeSpecBuilder,
    FuncSpec, abort_tool,
};

use crate::context::{NodeBinding, SessionBags};
use crate::spec::SpecKind;
use axon_types::{
    Args, AxonError, BackendFactory, ClientFactory, Provider, ProviderClient, TokenUsage,
    Transcript, validate_coerce,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Identifier of a node within one runtime. Allocated monotonically.
pub type NodeId = u64;

struct NodeEntry {
    spec: Arc<FuncSpec>,
    inputs: Args,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    state: NodeState,
    outputs: Option<Value>,
    error: Option<AxonError>,
    transcript: Transcript,
    session_bag: Arc<SessionBag>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
    usage: Option<TokenUsage>,
}

struct Observable {
    tx: watch::Sender<Arc<NodeView>>,
    last_touched: u64,
}

#[derive(Default)]
struct RuntimeState {
    next_node_id: NodeId,
    global_seq: u64,
    roots: Vec<NodeId>,
    nodes: HashMap<NodeId, NodeEntry>,
    observables: HashMap<NodeId, Observable>,
}

/// The scheduler and registry. Constructed through [`Runtime::builder`] and
/// always handled as `Arc<Runtime>`.
pub struct Runtime {
    specs: HashMap<String, Arc<FuncSpec>>,
    client_factories: HashMap<Provider, ClientFactory>,
    backends: HashMap<Provider, Arc<dyn BackendFactory>>,
    state: Mutex<RuntimeState>,
}

/// Builder for [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    specs: Vec<Arc<FuncSpec>>,
    client_factories: HashMap<Provider, ClientFactory>,
    backends: HashMap<Provider, Arc<dyn BackendFactory>>,
}

impl RuntimeBuilder {
    /// Seed one specification. Everything reachable through `uses` is
    /// registered transitively at build time.
    #[must_use]
    pub fn spec(mut self, spec: &Arc<FuncSpec>) -> Self {
        self.specs.push(spec.clone());
        self
    }

    /// Seed many specifications.
    #[must_use]
    pub fn specs<'a>(mut self, specs: impl IntoIterator<Item = &'a Arc<FuncSpec>>) -> Self {
        self.specs.extend(specs.into_iter().cloned());
        self
    }

    /// Register the client factory for a provider. The factory runs on
    /// first use per agent node; its return type is checked by the
    /// adapter's downcast.
    #[must_use]
    pub fn client_factory<F>(mut self, provider: Provider, factory: F) -> Self
    where
        F: Fn() -> ProviderClient + Send + Sync + 'static,
    {
        self.client_factories.insert(provider, Arc::new(factory));
        self
    }

    /// Register a backend adapter, keyed by the provider it serves.
    #[must_use]
    pub fn backend(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.backends.insert(factory.provider(), factory);
        self
    }

    /// Resolve transitive registrations and produce the runtime.
    ///
    /// Fails when two distinct specification instances share a name,
    /// whether among the seeds or anywhere in the `uses` graph.
    pub fn build(self) -> Result<Arc<Runtime>, AxonError> {
        let mut by_name: HashMap<String, Arc<FuncSpec>> = HashMap::new();
        let mut queue: VecDeque<Arc<FuncSpec>> = self.specs.into();
        while let Some(spec) = queue.pop_front() {
            match by_name.get(spec.name()) {
                Some(existing) if Arc::ptr_eq(existing, &spec) => continue,
                Some(_) => {
                    return Err(AxonError::Registration(format!(
                        "duplicate function name '{}' found during registration",
                        spec.name()
                    )));
                }
                None => {
                    by_name.insert(spec.name().to_string(), spec.clone());
                    for dep in spec.uses() {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }
        Ok(Arc::new(Runtime {
            specs: by_name,
            client_factories: self.client_factories,
            backends: self.backends,
            state: Mutex::new(RuntimeState::default()),
        }))
    }
}

impl Runtime {
    /// Start building a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// A context not tied to any node, for top-level invocations.
    pub fn get_ctx(self: &Arc<Self>) -> RunContext {
        RunContext::unbound(self.clone())
    }

    /// Look up a registered specification by name.
    pub fn get_spec(&self, name: &str) -> Option<Arc<FuncSpec>> {
        self.specs.get(name).cloned()
    }

    /// Latest snapshots for all top-level nodes, as one consistent cut.
    pub fn list_toplevel_views(&self) -> Vec<Arc<NodeView>> {
        let state = self.lock_state();
        state
            .roots
            .iter()
            .filter_map(|id| state.observables.get(id).map(|o| o.tx.borrow().clone()))
            .collect()
    }

    /// Latest snapshot for one node.
    pub fn get_view(&self, node_id: NodeId) -> Result<Arc<NodeView>, AxonError> {
        let state = self.lock_state();
        state
            .observables
            .get(&node_id)
            .map(|o| o.tx.borrow().clone())
            .ok_or_else(|| AxonError::message(format!("no node with id {node_id}")))
    }

    /// Block until the node's observable has been touched by a sequence
    /// number strictly greater than `as_of_seq`, then return its snapshot.
    /// With `as_of_seq = 0` this returns immediately (every node is
    /// published at creation with a positive sequence number).
    pub async fn watch(
        &self,
        node_id: NodeId,
        as_of_seq: u64,
    ) -> Result<Arc<NodeView>, AxonError> {
        let mut rx = {
            let state = self.lock_state();
            state
                .observables
                .get(&node_id)
                .map(|o| o.tx.subscribe())
                .ok_or_else(|| AxonError::message(format!("no node with id {node_id}")))?
        };
        loop {
            {
                let view = rx.borrow_and_update().clone();
                if view.update_seq > as_of_seq {
                    return Ok(view);
                }
            }
            rx.changed()
                .await
                .map_err(|_| AxonError::message("runtime dropped while watching"))?;
        }
    }

    // ─── Lifecycle posting ───────────────────────────────────────────────

    /// Post a non-terminal state change. Ignored once the node is terminal
    /// (terminal states are absorbing).
    pub fn post_state(&self, node_id: NodeId, new_state: NodeState) {
        let mut state = self.lock_state();
        let Some(entry) = state.nodes.get_mut(&node_id) else {
            return;
        };
        if entry.state.is_terminal() {
            return;
        }
        entry.state = new_state;
        state.global_seq += 1;
        Self::publish_from(&mut state, node_id);
    }

    /// Post successful completion with outputs.
    pub fn post_success(&self, node_id: NodeId, outputs: Value) {
        let mut state = self.lock_state();
        let Some(entry) = state.nodes.get_mut(&node_id) else {
            return;
        };
        if entry.state.is_terminal() {
            return;
        }
        entry.outputs = Some(outputs);
        entry.state = NodeState::Success;
        let done = entry.done.clone();
        state.global_seq += 1;
        Self::publish_from(&mut state, node_id);
        drop(state);
        done.send_replace(true);
    }

    /// Post a terminal exception. Cancellation errors land in the
    /// `Canceled` state, everything else in `Error`. A log record is
    /// emitted immediately so the fault leaves a trace even if no consumer
    /// ever collects `result()`.
    pub fn post_exception(&self, node_id: NodeId, error: AxonError) {
        let canceled = error.is_cancellation();
        let spec_name;
        {
            let mut state = self.lock_state();
            let Some(entry) = state.nodes.get_mut(&node_id) else {
                return;
            };
            if entry.state.is_terminal() {
                return;
            }
            spec_name = entry.spec.name().to_string();
            entry.error = Some(error.clone());
            entry.state = if canceled {
                NodeState::Canceled
            } else {
                NodeState::Error
            };
            let done = entry.done.clone();
            state.global_seq += 1;
            Self::publish_from(&mut state, node_id);
            drop(state);
            done.send_replace(true);
        }
        if canceled {
            tracing::debug!(node_id, spec = %spec_name, "node canceled");
        } else {
            tracing::error!(node_id, spec = %spec_name, error = %error, "node faulted");
        }
    }

    // ─── Invocation ──────────────────────────────────────────────────────

    pub(crate) fn invoke_internal(
        self: &Arc<Self>,
        caller: Option<NodeId>,
        spec: &Arc<FuncSpec>,
        inputs: &Value,
        opts: InvokeOptions,
    ) -> Result<Node, AxonError> {
        // Identity check: the registered object must be the supplied one.
        match self.specs.get(spec.name()) {
            None => {
                return Err(AxonError::Registration(format!(
                    "function '{}' is not registered with this runtime",
                    spec.name()
                )));
            }
            Some(registered) if !Arc::ptr_eq(registered, spec) => {
                return Err(AxonError::Registration(format!(
                    "invoked function '{}' is not the instance registered under that name",
                    spec.name()
                )));
            }
            Some(_) => {}
        }

        let args = validate_coerce(spec.name(), spec.args(), inputs)?;

        // Resolve the worker wiring before touching any shared state, so a
        // wiring failure creates no node.
        enum Wiring {
            Code(Arc<dyn CodeCallable>),
            Agent {
                provider: Provider,
                backend: Arc<dyn BackendFactory>,
                client_factory: ClientFactory,
            },
        }
        let wiring = match spec.kind() {
            SpecKind::Code { callable } => {
                if let Some(provider) = opts.provider {
                    return Err(AxonError::Registration(format!(
                        "provider override ({provider}) is only valid for agent functions; \
                         '{}' is a code function",
                        spec.name()
                    )));
                }
                Wiring::Code(callable.clone())
            }
            SpecKind::Agent(detail) => {
                let provider = opts.provider.unwrap_or(detail.default_provider);
                let backend = self.backends.get(&provider).cloned().ok_or_else(|| {
                    AxonError::Registration(format!(
                        "no backend adapter registered for provider '{provider}'"
                    ))
                })?;
                let client_factory =
                    self.client_factories.get(&provider).cloned().ok_or_else(|| {
                        AxonError::Registration(format!(
                            "no client factory registered for provider '{provider}'"
                        ))
                    })?;
                Wiring::Agent {
                    provider,
                    backend,
                    client_factory,
                }
            }
        };

        let own_bag = Arc::new(SessionBag::new());
        let transcript = Transcript::new();
        let (done_tx, _done_rx) = watch::channel(false);

        let (node_id, cancel, bags, link_parent) = {
            let mut state = self.lock_state();

            let node_id = state.next_node_id;
            state.next_node_id += 1;

            let caller_cancel = caller
                .and_then(|id| state.nodes.get(&id))
                .map(|e| e.cancel.clone());

            // Children inherit the caller's token unless a distinct one is
            // supplied, which is then linked one-way below.
            let (cancel, link_parent) = match (opts.cancel.clone(), caller_cancel) {
                (Some(token), Some(parent_token)) => (token, Some(parent_token)),
                (Some(token), None) => (token, None),
                (None, Some(parent_token)) => (parent_token, None),
                (None, None) => (CancellationToken::new(), None),
            };

            let parent_bag = caller
                .and_then(|id| state.nodes.get(&id))
                .map(|e| e.session_bag.clone());
            let top_level_bag = match caller {
                None => own_bag.clone(),
                Some(mut current) => {
                    while let Some(parent) = state.nodes.get(&current).and_then(|e| e.parent) {
                        current = parent;
                    }
                    state
                        .nodes
                        .get(&current)
                        .map(|e| e.session_bag.clone())
                        .unwrap_or_else(|| own_bag.clone())
                }
            };
            let bags = SessionBags {
                own: own_bag.clone(),
                parent: parent_bag,
                top_level: top_level_bag,
            };

            state.nodes.insert(
                node_id,
                NodeEntry {
                    spec: spec.clone(),
                    inputs: args.clone(),
                    parent: caller,
                    children: Vec::new(),
                    state: NodeState::Waiting,
                    outputs: None,
                    error: None,
                    transcript: transcript.clone(),
                    session_bag: own_bag,
                    cancel: cancel.clone(),
                    done: done_tx,
                    usage: None,
                },
            );
            match caller {
                None => state.roots.push(node_id),
                Some(parent) => {
                    if let Some(entry) = state.nodes.get_mut(&parent) {
                        entry.children.push(node_id);
                    }
                }
            }

            state.global_seq += 1;
            Self::publish_from(&mut state, node_id);

            (node_id, cancel, bags, link_parent)
        };

        // One-way link: caller cancellation reaches the distinct child
        // token, never the reverse.
        if let Some(parent_token) = link_parent {
            let child_token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = parent_token.cancelled() => child_token.cancel(),
                    _ = child_token.cancelled() => {}
                }
            });
        }

        let ctx = RunContext::bound(
            self.clone(),
            NodeBinding {
                id: node_id,
                cancel,
                bags,
            },
        );

        // Start the worker.
        match wiring {
            Wiring::Code(callable) => {
                let rt = self.clone();
                tokio::spawn(async move {
                    rt.post_state(node_id, NodeState::Running);
                    match callable.call(ctx, args).await {
                        Ok(outputs) => rt.post_success(node_id, outputs),
                        Err(error) => rt.post_exception(node_id, error),
                    }
                });
            }
            Wiring::Agent {
                provider,
                backend,
                client_factory,
            } => {
                let rt = self.clone();
                let spec = spec.clone();
                tokio::spawn(async move {
                    agent::run_agent_node(
                        rt,
                        node_id,
                        spec,
                        args,
                        ctx,
                        provider,
                        client_factory,
                        backend,
                    )
                    .await;
                });
            }
        }

        Ok(Node {
            id: node_id,
            rt: self.clone(),
        })
    }

    // ─── Internal accessors used by Node handles and workers ─────────────

    fn lock_state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().expect("runtime mutex poisoned")
    }

    pub(crate) fn node_state(&self, node_id: NodeId) -> NodeState {
        self.lock_state()
            .nodes
            .get(&node_id)
            .map(|e| e.state)
            .unwrap_or(NodeState::Waiting)
    }

    pub(crate) async fn wait_done(&self, node_id: NodeId) {
        let mut rx = {
            let state = self.lock_state();
            match state.nodes.get(&node_id) {
                Some(entry) => entry.done.subscribe(),
                None => return,
            }
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn node_outcome(&self, node_id: NodeId) -> Result<Value, AxonError> {
        let state = self.lock_state();
        let Some(entry) = state.nodes.get(&node_id) else {
            return Err(AxonError::message(format!("no node with id {node_id}")));
        };
        match entry.state {
            NodeState::Success => Ok(entry.outputs.clone().unwrap_or(Value::Null)),
            NodeState::Error | NodeState::Canceled => Err(entry
                .error
                .clone()
                .unwrap_or_else(|| AxonError::message("node failed without a recorded error"))),
            other => Err(AxonError::message(format!(
                "node {node_id} has not completed (state: {other:?})"
            ))),
        }
    }

    pub(crate) fn transcript_of(&self, node_id: NodeId) -> Transcript {
        self.lock_state()
            .nodes
            .get(&node_id)
            .map(|e| e.transcript.clone())
            .unwrap_or_default()
    }

    pub(crate) fn token_usage_of(&self, node_id: NodeId) -> Option<TokenUsage> {
        self.lock_state()
            .nodes
            .get(&node_id)
            .and_then(|e| e.usage.clone())
    }

    pub(crate) fn record_usage(&self, node_id: NodeId, usage: TokenUsage) {
        if let Some(entry) = self.lock_state().nodes.get_mut(&node_id) {
            entry.usage = Some(usage);
        }
    }

    pub(crate) fn cancel_token_of(&self, node_id: NodeId) -> CancellationToken {
        self.lock_state()
            .nodes
            .get(&node_id)
            .map(|e| e.cancel.clone())
            .unwrap_or_default()
    }

    // ─── Observable publishing ───────────────────────────────────────────

    /// Walk from the mutated node to the root, refreshing every observable
    /// not yet touched by the current sequence number. Runs under the state
    /// lock; the lock is never held across an await.
    fn publish_from(state: &mut RuntimeState, node_id: NodeId) {
        let seq = state.global_seq;
        let mut current = Some(node_id);
        while let Some(id) = current {
            let Some(entry) = state.nodes.get(&id) else {
                break;
            };
            let parent = entry.parent;
            let already_touched = state
                .observables
                .get(&id)
                .is_some_and(|o| o.last_touched >= seq);
            if !already_touched {
                let Some(view) = Self::build_view(state, id, seq) else {
                    break;
                };
                match state.observables.get_mut(&id) {
                    Some(observable) => {
                        observable.last_touched = seq;
                        observable.tx.send_replace(view);
                    }
                    None => {
                        let (tx, _rx) = watch::channel(view);
                        state.observables.insert(
                            id,
                            Observable {
                                tx,
                                last_touched: seq,
                            },
                        );
                    }
                }
            }
            current = parent;
        }
    }

    fn build_view(state: &RuntimeState, node_id: NodeId, seq: u64) -> Option<Arc<NodeView>> {
        let entry = state.nodes.get(&node_id)?;
        let children = entry
            .children
            .iter()
            .filter_map(|child| state.observables.get(child).map(|o| o.tx.borrow().clone()))
            .collect();
        Some(Arc::new(NodeView {
            id: node_id,
            spec: entry.spec.clone(),
            inputs: entry.inputs.clone(),
            state: entry.state,
            outputs: entry.outputs.clone(),
            error: entry.error.clone(),
            children,
            update_seq: seq,
        }))
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Runtime")
            .field("specs", &self.specs.len())
            .field("nodes", &state.nodes.len())
            .field("global_seq", &state.global_seq)
            .finish()
    }
}
