// ── Node registry ──
//
// Authoritative in-process map from node id to last-known state.
// Mutations are broadcast to subscribers via `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::Collection;
use crate::model::{NodeDelta, NodeId, NodeState};
use crate::stream::NodeStream;

/// Reactive store of every node seen so far.
///
/// Reads never block writers for long: lookups take a per-shard read
/// lock inside `DashMap`. The bridge event loop is the only writer.
pub struct NodeRegistry {
    nodes: Collection<NodeId, NodeState>,
    last_report: watch::Sender<Option<DateTime<Utc>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        let (last_report, _) = watch::channel(None);
        Self {
            nodes: Collection::new(),
            last_report,
        }
    }

    /// Create the node from `delta` if unseen, else merge `delta` into it.
    ///
    /// Returns the resulting state and `true` if the node was created.
    pub fn upsert(&self, id: &NodeId, delta: &NodeDelta) -> (Arc<NodeState>, bool) {
        self.nodes.upsert_with(
            id.clone(),
            || NodeState::from_delta(id.clone(), delta),
            |prev| {
                let mut next = prev.clone();
                next.merge(delta);
                next
            },
        )
    }

    /// Look up a node. Never creates one.
    pub fn get(&self, id: &NodeId) -> Option<Arc<NodeState>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes ordered by id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<NodeState>>> {
        self.nodes.snapshot()
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        self.nodes.version()
    }

    pub fn subscribe(&self) -> NodeStream {
        NodeStream::new(self.nodes.subscribe())
    }

    // ── Report bookkeeping ───────────────────────────────────────────

    pub(crate) fn mark_report(&self) {
        self.last_report.send_replace(Some(Utc::now()));
    }

    /// Time of the last applied state report.
    pub fn last_report(&self) -> Option<DateTime<Utc>> {
        *self.last_report.borrow()
    }

    pub fn subscribe_last_report(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_report.subscribe()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
