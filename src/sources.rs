//! Named input bindings for a graph run.
//!
//! A [`Sources`] maps each input name used by [`Graph::from_source`] to a
//! *factory*: a function that produces a fresh record iterator every time it is
//! called. The runner invokes a factory lazily, when its source stage is first
//! pulled, and once per branch that reads the source.
//!
//! ```
//! use compgraph::{Graph, Sources, record};
//!
//! let mut sources = Sources::new();
//! sources.bind_vec("docs", vec![record! { "doc_id" => 1, "text" => "hello" }]);
//! let out = Graph::from_source("docs").run(&sources)?.collect_records()?;
//! assert_eq!(out.len(), 1);
//! # Ok::<(), compgraph::Error>(())
//! ```
//!
//! [`Graph::from_source`]: crate::Graph::from_source

use crate::record::Record;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Iterator produced by a source factory.
pub type SourceIter = Box<dyn Iterator<Item = Result<Record>>>;

/// Produces a fresh iterator over a named input.
pub type SourceFactory = Arc<dyn Fn() -> Result<SourceIter> + Send + Sync>;

/// Bindings from input names to source factories.
#[derive(Clone, Default)]
pub struct Sources {
    factories: HashMap<String, SourceFactory>,
}

impl Sources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an infallible factory. Rebinding replaces the old factory.
    pub fn bind<F, I>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'static,
    {
        self.bind_fallible(name, move || -> Result<SourceIter> {
            Ok(Box::new(factory().into_iter().map(Ok)))
        })
    }

    /// Bind `name` to a factory that may fail to open, or fail per record.
    pub fn bind_fallible<F, I>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<I> + Send + Sync + 'static,
        I: Iterator<Item = Result<Record>> + 'static,
    {
        let factory: SourceFactory = Arc::new(move || -> Result<SourceIter> {
            Ok(Box::new(factory()?))
        });
        self.factories.insert(name.into(), factory);
        self
    }

    /// Bind `name` to an in-memory list of records, cloned for every run.
    pub fn bind_vec(&mut self, name: impl Into<String>, records: Vec<Record>) -> &mut Self {
        let records = Arc::new(records);
        self.bind(name, move || records.as_ref().clone())
    }

    /// Bind `name` to a JSONL file, re-read on every run.
    #[cfg(feature = "io-jsonl")]
    pub fn bind_jsonl(
        &mut self,
        name: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
    ) -> &mut Self {
        let path: std::path::PathBuf = path.into();
        self.bind_fallible(name, move || crate::io::jsonl::read_jsonl_records(&path))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Bound names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn factory(&self, name: &str) -> Option<&SourceFactory> {
        self.factories.get(name)
    }
}
