use crate::io::LineParser;
use crate::node_id::{NodeId, NodeLabel};
use crate::operations::{FlatMapper, Joiner, Mapper, Predicate, Reducer};
use std::path::PathBuf;
use std::sync::Arc;

/// What a node does. Operations are shared so that a graph can be cloned and
/// run any number of times.
#[derive(Clone)]
pub enum NodeKind {
    /// Leaf bound to a named input at run time.
    Source { name: String },
    /// Leaf reading a line-delimited file.
    File {
        path: PathBuf,
        parser: Arc<LineParser>,
    },
    Map(Arc<dyn Mapper>),
    FlatMap(Arc<dyn FlatMapper>),
    Filter(Arc<dyn Predicate>),
    /// External sort by key fields (barrier).
    Sort { keys: Arc<[String]> },
    /// Grouped fold over input sorted by `keys`.
    Reduce {
        reducer: Arc<dyn Reducer>,
        keys: Arc<[String]>,
    },
    /// Sort-merge join. The node's `parent` is the left side.
    Join {
        joiner: Arc<dyn Joiner>,
        keys: Arc<[String]>,
        right: Arc<Node>,
    },
}

/// One immutable vertex of a computation graph.
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<Arc<Node>>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, parent: Option<Arc<Self>>) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            kind,
            parent,
        })
    }

    /// Upstream nodes, left before right.
    #[must_use]
    pub fn parents(&self) -> Vec<&Arc<Self>> {
        let mut out: Vec<&Arc<Self>> = self.parent.iter().collect();
        if let NodeKind::Join { right, .. } = &self.kind {
            out.push(right);
        }
        out
    }

    /// Whether the node must see (part of) its input before emitting.
    #[must_use]
    pub const fn is_barrier(&self) -> bool {
        matches!(self.kind, NodeKind::Sort { .. })
    }

    #[must_use]
    pub fn label(&self) -> NodeLabel {
        let (kind, detail) = match &self.kind {
            NodeKind::Source { name } => ("source", name.clone()),
            NodeKind::File { path, .. } => ("file", path.display().to_string()),
            NodeKind::Map(op) => ("map", op.name().to_string()),
            NodeKind::FlatMap(op) => ("flat_map", op.name().to_string()),
            NodeKind::Filter(op) => ("filter", op.name().to_string()),
            NodeKind::Sort { keys } => ("sort", keys.join(", ")),
            NodeKind::Reduce { reducer, keys } => {
                ("reduce", format!("{} by [{}]", reducer.name(), keys.join(", ")))
            }
            NodeKind::Join { joiner, keys, .. } => {
                ("join", format!("{} on [{}]", joiner.name(), keys.join(", ")))
            }
        };
        NodeLabel {
            id: self.id,
            kind,
            detail,
        }
    }
}
