//! Nodes — runtime instances of function specifications — and their
//! immutable snapshots.
//!
//! The runtime exclusively owns the node table; user code holds cheap
//! [`Node`] handles that read through the runtime's lock. [`NodeView`] is
//! the deep-immutable snapshot published to watchers: a view of a parent
//! embeds the latest-known view of each child at the moment of its refresh.

use crate::spec::FuncSpec;
use crate::{NodeId, Runtime};
use axon_types::{Args, AxonError, TokenUsage, TranscriptPart};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a node. Transitions are monotonic:
/// `Waiting → Running → {Success | Error | Canceled}`; terminal states are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Created, worker not yet running.
    Waiting,
    /// Worker executing.
    Running,
    /// Completed with outputs.
    Success,
    /// Completed with an error.
    Error,
    /// Completed by cooperative cancellation.
    Canceled,
}

impl NodeState {
    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Success | NodeState::Error | NodeState::Canceled)
    }
}

/// Immutable snapshot of one node and its descendants at a global sequence
/// number. Safe to hand across threads; inputs and outputs are those pinned
/// at publish time.
#[derive(Debug, Clone)]
pub struct NodeView {
    /// Node id.
    pub id: NodeId,
    /// The specification this node instantiates.
    pub spec: Arc<FuncSpec>,
    /// Validated inputs.
    pub inputs: Args,
    /// State at publish time.
    pub state: NodeState,
    /// Outputs, present once the node succeeded.
    pub outputs: Option<Value>,
    /// Terminal error, present once the node failed or was canceled.
    pub error: Option<AxonError>,
    /// Latest-known child views, in invocation order.
    pub children: Vec<Arc<NodeView>>,
    /// Global sequence number this snapshot was published at.
    pub update_seq: u64,
}

/// Handle to a live or completed node. Cloneable; all accessors read the
/// runtime's current state.
#[derive(Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) rt: Arc<Runtime>,
}

impl Node {
    /// The node's id, unique within its runtime.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.rt.node_state(self.id)
    }

    /// Whether the node reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Block until the node reaches a terminal state.
    pub async fn wait(&self) {
        self.rt.wait_done(self.id).await;
    }

    /// Block until terminal, then return the outputs or re-raise the
    /// terminal error.
    pub async fn result(&self) -> Result<Value, AxonError> {
        self.wait().await;
        self.rt.node_outcome(self.id)
    }

    /// Block until this node's observable has been touched by a sequence
    /// number strictly greater than `as_of_seq`, then return the current
    /// snapshot. `as_of_seq = 0` returns immediately with the latest view.
    pub async fn watch(&self, as_of_seq: u64) -> Result<Arc<NodeView>, AxonError> {
        self.rt.watch(self.id, as_of_seq).await
    }

    /// Snapshot of the node's transcript so far.
    pub fn transcript(&self) -> Vec<TranscriptPart> {
        self.rt.transcript_of(self.id).snapshot()
    }

    /// Cumulative token usage, for agent nodes that have reported any.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.rt.token_usage_of(self.id)
    }

    /// The node's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.rt.cancel_token_of(self.id)
    }

    /// Request cooperative cancellation of this node (and everything
    /// sharing or linked below its token).
    pub fn request_cancel(&self) {
        self.cancel_token().cancel();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
