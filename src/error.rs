//! Engine error taxonomy.
//!
//! User-supplied operations report failures as [`anyhow::Error`]; the engine
//! wraps them with the identity of the node they came from. Every error aborts
//! the run that produced it: a [`RecordStream`](crate::RecordStream) yields no
//! further records after its first `Err`.

use crate::node_id::NodeLabel;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The graph reads a named input that was not bound when running it.
    #[error("no source bound for input `{name}`")]
    Binding { name: String },

    /// A Reduce or Join stage saw a group key smaller than the previous one.
    #[error("{node}: input is not sorted by {keys:?}; key {current} follows {previous}")]
    OrderingViolation {
        node: NodeLabel,
        keys: Vec<String>,
        previous: String,
        current: String,
    },

    /// A user-supplied mapper, predicate, reducer, joiner or parser failed.
    #[error("{node}: operation failed: {source:#}")]
    Operation {
        node: NodeLabel,
        #[source]
        source: anyhow::Error,
    },

    /// A record lacks a field used as a sort, group or join key.
    #[error("{node}: record has no key field `{field}`")]
    MissingKey { node: NodeLabel, field: String },

    /// A bound source factory, or the iterator it returned, failed.
    #[error("source `{name}` failed: {source:#}")]
    Source {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// External sort could not create, write or read its temporary storage.
    #[error("external sort storage: {context}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn resource(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn operation(node: &NodeLabel, source: anyhow::Error) -> Self {
        Self::Operation {
            node: node.clone(),
            source,
        }
    }

    /// The node the error is attributed to, if any.
    #[must_use]
    pub const fn node(&self) -> Option<&NodeLabel> {
        match self {
            Self::OrderingViolation { node, .. }
            | Self::Operation { node, .. }
            | Self::MissingKey { node, .. } => Some(node),
            Self::Binding { .. } | Self::Source { .. } | Self::Resource { .. } => None,
        }
    }
}
