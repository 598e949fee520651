//! # Compgraph
//!
//! A **lazily evaluated computation graph** over streams of schemaless records,
//! in the map-reduce style. Graphs are described first and run later against
//! named inputs; records are pulled through the graph one at a time, and the
//! only stage that buffers data, the sort, spills to disk past a configurable
//! memory limit.
//!
//! ## Key Features
//!
//! - **Declarative graph API** - chain `map`, `flat_map`, `filter`, `sort`,
//!   `reduce` and `join` with a fluent interface
//! - **Reusable descriptions** - a [`Graph`] is an immutable value; branch it,
//!   join it with itself, run it any number of times
//! - **Bounded memory** - external merge sort with a record-count limit; reduce
//!   and join hold one key group at a time
//! - **Sort-merge joins** - inner, left, right and outer
//! - **Operation library** - word splitting, TF-IDF, PMI, haversine distance,
//!   travel time, counting, top-N and more
//! - **Typed errors** - every failure names the node it came from
//!
//! ## Quick Start
//!
//! ```
//! use compgraph::{Graph, Sources, record};
//! use compgraph::operations::mappers::{LowerCase, Split};
//! use compgraph::operations::reducers::Count;
//!
//! let graph = Graph::from_source("docs")
//!     .map(LowerCase::new("text"))
//!     .flat_map(Split::new("text"))
//!     .sort(&["text"])
//!     .reduce(Count::new("count"), &["text"]);
//!
//! let mut sources = Sources::new();
//! sources.bind_vec("docs", vec![record! { "text" => "Hello hello world" }]);
//!
//! let counts = graph.run(&sources)?.collect_records()?;
//! assert_eq!(counts, vec![
//!     record! { "text" => "hello", "count" => 2 },
//!     record! { "text" => "world", "count" => 1 },
//! ]);
//! # Ok::<(), compgraph::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is an ordered map from field names to [`Value`]s (null, bool,
//! int, float, string, list). Values have a total order, so any field can be a
//! sort or group key.
//!
//! ### Graphs and sources
//!
//! A [`Graph`] reads from a named input ([`Graph::from_source`]) or a file
//! ([`Graph::from_file`]). At run time, [`Sources`] binds each input name to a
//! factory producing a fresh iterator; a missing binding is reported before any
//! record is pulled.
//!
//! ### Grouping contract
//!
//! `reduce` and `join` require their inputs sorted by the key fields. They do
//! not sort implicitly: insert a `sort` stage first. An out-of-order key is
//! reported as [`Error::OrderingViolation`].
//!
//! ### Execution
//!
//! [`Graph::run`] (or [`Runner::run`] for custom sort settings and metrics)
//! returns a [`RecordStream`]. Nothing is read until it is pulled; after the
//! first error it yields nothing more. [`Graph::explain`] prints the plan.
//!
//! ## Modules
//!
//! - [`operations`] - operation traits and the ready-made library
//! - [`algorithms`] - word count, inverted index, PMI, road speed
//! - [`external_sort`] - the bounded-memory sorter, usable on its own
//! - [`io`] - line-oriented file input and JSON lines
//! - [`metrics`] - run counters and peaks
//! - [`testing`] - assertions, fixtures and temp-file helpers

pub mod algorithms;
pub mod error;
pub mod external_sort;
pub mod graph;
pub mod grouping;
pub mod io;
pub mod metrics;
pub mod node;
pub mod node_id;
pub mod operations;
pub mod planner;
pub mod record;
pub mod runner;
pub mod sources;
pub mod testing;
pub mod value;

// General re-exports
pub use error::{Error, Result};
pub use external_sort::{ExternalSorter, SortConfig, SortedStream, external_sort};
pub use graph::Graph;
pub use grouping::Group;
pub use metrics::MetricsCollector;
pub use node_id::{NodeId, NodeLabel};
pub use operations::{FlatMapper, Joiner, Mapper, Predicate, Reducer};
pub use planner::Plan;
pub use record::Record;
pub use runner::{RecordStream, Runner};
pub use sources::Sources;
pub use value::Value;

// Gated re-exports
#[cfg(feature = "io-jsonl")]
pub use io::jsonl::{read_jsonl_records, write_jsonl_records, write_jsonl_vec};
