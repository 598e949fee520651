//! The computation graph builder.
//!
//! A [`Graph`] is a handle to the output node of an immutable DAG. Every builder
//! method appends one node and returns a new handle; the receiver is left
//! untouched, so one graph can feed any number of branches:
//!
//! ```
//! use compgraph::{Graph, Record, Sources, record};
//! use compgraph::operations::joiners::MergeJoiner;
//! use compgraph::operations::reducers::Count;
//!
//! let words = Graph::from_source("words");
//! let counted = words.sort(&["word"]).reduce(Count::new("count"), &["word"]);
//! let tagged = words
//!     .sort(&["word"])
//!     .join(MergeJoiner::inner(), &counted, &["word"]);
//!
//! let mut sources = Sources::new();
//! sources.bind_vec("words", vec![
//!     record! { "word" => "b" },
//!     record! { "word" => "a" },
//!     record! { "word" => "b" },
//! ]);
//! let out: Vec<Record> = tagged.run(&sources)?.collect_records()?;
//! assert_eq!(out.len(), 3);
//! assert_eq!(out[0], record! { "word" => "a", "count" => 1 });
//! # Ok::<(), compgraph::Error>(())
//! ```
//!
//! Reduce and join stages expect their input ordered by their keys and do not
//! sort it themselves; put a [`sort`](Graph::sort) in front of them unless the
//! upstream stage already emits records in key order.

use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::node_id::NodeId;
use crate::operations::{FlatMapper, Joiner, Mapper, Predicate, Reducer};
use crate::planner::Plan;
use crate::record::Record;
use crate::runner::{RecordStream, Runner};
use crate::sources::Sources;
use std::path::PathBuf;
use std::sync::Arc;

fn key_list<S: AsRef<str>>(keys: &[S]) -> Arc<[String]> {
    keys.iter().map(|k| k.as_ref().to_string()).collect()
}

/// Handle to the output node of a computation graph.
#[derive(Clone)]
pub struct Graph {
    node: Arc<Node>,
}

impl Graph {
    fn leaf(kind: NodeKind) -> Self {
        Self {
            node: Node::new(kind, None),
        }
    }

    fn then(&self, kind: NodeKind) -> Self {
        Self {
            node: Node::new(kind, Some(Arc::clone(&self.node))),
        }
    }

    /// A graph reading the input bound to `name` at run time.
    pub fn from_source(name: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Source { name: name.into() })
    }

    /// A graph reading a line-delimited file, parsing each non-blank line with
    /// `parser`. The file is opened on the first pull of each run.
    pub fn from_file<F>(path: impl Into<PathBuf>, parser: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Record> + Send + Sync + 'static,
    {
        Self::leaf(NodeKind::File {
            path: path.into(),
            parser: Arc::new(parser),
        })
    }

    /// A graph reading a JSONL file, one object per line.
    #[cfg(feature = "io-jsonl")]
    pub fn from_jsonl(path: impl Into<PathBuf>) -> Self {
        Self::from_file(path, Record::from_json_str)
    }

    #[must_use]
    pub fn map<M: Mapper + 'static>(&self, mapper: M) -> Self {
        self.then(NodeKind::Map(Arc::new(mapper)))
    }

    #[must_use]
    pub fn flat_map<M: FlatMapper + 'static>(&self, mapper: M) -> Self {
        self.then(NodeKind::FlatMap(Arc::new(mapper)))
    }

    #[must_use]
    pub fn filter<P: Predicate + 'static>(&self, predicate: P) -> Self {
        self.then(NodeKind::Filter(Arc::new(predicate)))
    }

    /// Order records by `keys`, ascending, keeping input order on ties. Uses
    /// bounded memory: see [`SortConfig`](crate::SortConfig).
    #[must_use]
    pub fn sort<S: AsRef<str>>(&self, keys: &[S]) -> Self {
        self.then(NodeKind::Sort {
            keys: key_list(keys),
        })
    }

    /// Apply `reducer` to each run of records with equal `keys`.
    #[must_use]
    pub fn reduce<R: Reducer + 'static, S: AsRef<str>>(&self, reducer: R, keys: &[S]) -> Self {
        self.then(NodeKind::Reduce {
            reducer: Arc::new(reducer),
            keys: key_list(keys),
        })
    }

    /// Merge this graph (left) with `right` on `keys`. Both sides must be
    /// ordered by `keys`.
    #[must_use]
    pub fn join<J: Joiner + 'static, S: AsRef<str>>(
        &self,
        joiner: J,
        right: &Self,
        keys: &[S],
    ) -> Self {
        self.then(NodeKind::Join {
            joiner: Arc::new(joiner),
            keys: key_list(keys),
            right: Arc::clone(&right.node),
        })
    }

    /// Run with the default [`Runner`].
    ///
    /// # Errors
    /// Returns [`Error::Binding`](crate::Error::Binding) if an input is unbound.
    pub fn run(&self, sources: &Sources) -> Result<RecordStream> {
        Runner::default().run(self, sources)
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    #[must_use]
    pub fn explain(&self) -> Plan {
        Plan::build(&self.node)
    }

    pub(crate) const fn node(&self) -> &Arc<Node> {
        &self.node
    }
}
