//! Identifiers for graph nodes.
//!
//! Every node built by a [`Graph`](crate::Graph) builder method gets a fresh
//! [`NodeId`] from a process-wide counter, so ids stay unique even when nodes from
//! independently built graphs are joined together. Errors raised while running a
//! node carry a [`NodeLabel`]: the id plus the node kind and operation name.

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Unique numeric identifier for a node in a computation graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "#{}", self.0)
    }
}

/// Human-readable identity of a node, used in errors and plan output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLabel {
    pub id: NodeId,
    /// Node kind: `source`, `map`, `sort`, `reduce`, ...
    pub kind: &'static str,
    /// Operation detail: a source name, an operation type name, or sort keys.
    pub detail: String,
}

impl Display for NodeLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "{} {}({})", self.id, self.kind, self.detail)
    }
}
