// ── Reactive node streams ──
//
// Subscription types for consuming registry changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::NodeState;

/// Snapshot of every known node, ordered by id.
pub type NodeSnapshot = Arc<Vec<Arc<NodeState>>>;

/// A subscription to the node registry.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct NodeStream {
    current: NodeSnapshot,
    receiver: watch::Receiver<NodeSnapshot>,
}

impl NodeStream {
    pub(crate) fn new(receiver: watch::Receiver<NodeSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &NodeSnapshot {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> NodeSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the registry is dropped.
    pub async fn changed(&mut self) -> Option<NodeSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> NodeWatchStream {
        NodeWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a new snapshot after each registry mutation.
pub struct NodeWatchStream {
    inner: WatchStream<NodeSnapshot>,
}

impl Stream for NodeWatchStream {
    type Item = NodeSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
