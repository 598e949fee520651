//! Demand-driven graph execution.
//!
//! [`Runner::run`] turns a [`Graph`] into a chain of boxed iterators, one per
//! node, and hands back the last one as a [`RecordStream`]. Building the chain
//! does no work: each stage pulls from its parents only when it is itself
//! pulled, sources open their factories on the first pull, and a sort consumes
//! its input only when its first output record is requested.
//!
//! A node reachable along several paths is instantiated once per path, so a
//! source feeding two branches of a join is read twice.

use crate::error::{Error, Result};
use crate::external_sort::{ExternalSorter, SortConfig};
use crate::graph::Graph;
use crate::grouping::{JoinStage, ReduceStage};
use crate::io::read_records;
use crate::metrics::MetricsCollector;
use crate::node::{Node, NodeKind};
use crate::record::Record;
use crate::sources::Sources;
use std::sync::Arc;
use tracing::debug;

/// A running stage: a lazy, fallible record iterator.
pub(crate) type Stage = Box<dyn Iterator<Item = Result<Record>>>;

type OpenStage = Box<dyn FnOnce() -> Result<Stage>>;

/// Execution settings for a graph run.
///
/// ```
/// use compgraph::{Runner, SortConfig};
/// use compgraph::metrics::MetricsCollector;
///
/// let runner = Runner {
///     sort: SortConfig::default().with_memory_limit(10_000),
///     metrics: Some(MetricsCollector::new()),
/// };
/// # let _ = runner;
/// ```
#[derive(Clone, Default)]
pub struct Runner {
    /// Memory budget and spill location for every sort stage.
    pub sort: SortConfig,
    /// Collector for run metrics, if any.
    pub metrics: Option<MetricsCollector>,
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sort_config(mut self, sort: SortConfig) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bind `graph` to `sources` and return its lazy output.
    ///
    /// # Errors
    /// Returns [`Error::Binding`] if the graph reads an input name with no
    /// factory in `sources`. Nothing is pulled before this check.
    pub fn run(&self, graph: &Graph, sources: &Sources) -> Result<RecordStream> {
        let plan = graph.explain();
        if let Some(name) = plan
            .required_sources()
            .iter()
            .find(|name| !sources.contains(name))
        {
            return Err(Error::Binding { name: name.clone() });
        }
        if let Some(m) = &self.metrics {
            m.record_start();
        }
        debug!(nodes = plan.steps.len(), output = %graph.node_id(), "starting graph run");
        let stage = self.build(graph.node(), sources)?;
        Ok(RecordStream {
            stage: Some(stage),
            metrics: self.metrics.clone(),
            emitted: 0,
        })
    }

    /// Run `graph` to completion and collect its output.
    ///
    /// # Errors
    /// Any error raised by the run.
    pub fn run_collect(&self, graph: &Graph, sources: &Sources) -> Result<Vec<Record>> {
        self.run(graph, sources)?.collect_records()
    }

    fn parent_stage(&self, node: &Node, sources: &Sources) -> Result<Stage> {
        match &node.parent {
            Some(parent) => self.build(parent, sources),
            None => Err(Error::operation(
                &node.label(),
                anyhow::anyhow!("node has no input"),
            )),
        }
    }

    fn build(&self, node: &Arc<Node>, sources: &Sources) -> Result<Stage> {
        let label = node.label();
        let stage: Stage = match &node.kind {
            NodeKind::Source { name } => {
                let factory = sources
                    .factory(name)
                    .cloned()
                    .ok_or_else(|| Error::Binding { name: name.clone() })?;
                let name = name.clone();
                Box::new(Deferred::new(Box::new(move || -> Result<Stage> {
                    let name_for_items = name.clone();
                    let iter = factory().map_err(|source| Error::Source { name, source })?;
                    Ok(Box::new(iter.map(move |item| {
                        item.map_err(|source| Error::Source {
                            name: name_for_items.clone(),
                            source,
                        })
                    })) as Stage)
                })))
            }
            NodeKind::File { path, parser } => {
                let path = path.clone();
                let parser = Arc::clone(parser);
                Box::new(Deferred::new(Box::new(move || -> Result<Stage> {
                    let lines =
                        read_records(&path, parser).map_err(|e| Error::operation(&label, e))?;
                    Ok(Box::new(lines.map(move |item| {
                        item.map_err(|e| Error::operation(&label, e))
                    })) as Stage)
                })))
            }
            NodeKind::Map(op) => {
                let op = Arc::clone(op);
                let input = self.parent_stage(node, sources)?;
                Box::new(input.map(move |item| {
                    item.and_then(|record| op.map(record).map_err(|e| Error::operation(&label, e)))
                }))
            }
            NodeKind::FlatMap(op) => {
                let op = Arc::clone(op);
                let input = self.parent_stage(node, sources)?;
                Box::new(input.flat_map(move |item| -> Vec<Result<Record>> {
                    match item.and_then(|record| {
                        op.flat_map(record).map_err(|e| Error::operation(&label, e))
                    }) {
                        Ok(out) => out.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    }
                }))
            }
            NodeKind::Filter(op) => {
                let op = Arc::clone(op);
                let input = self.parent_stage(node, sources)?;
                Box::new(input.filter_map(move |item| match item {
                    Err(e) => Some(Err(e)),
                    Ok(record) => match op.test(&record) {
                        Ok(true) => Some(Ok(record)),
                        Ok(false) => None,
                        Err(e) => Some(Err(Error::operation(&label, e))),
                    },
                }))
            }
            NodeKind::Sort { keys } => {
                let keys = Arc::clone(keys);
                let input = self.parent_stage(node, sources)?;
                let mut sorter = ExternalSorter::new(self.sort.clone());
                if let Some(m) = &self.metrics {
                    sorter = sorter.with_metrics(m.clone());
                }
                Box::new(Deferred::new(Box::new(move || -> Result<Stage> {
                    debug!(node = %label, "sorting input");
                    let sorted = sorter.sort(input, |record: &Record| {
                        record.key(&keys[..]).map_err(|field| Error::MissingKey {
                            node: label.clone(),
                            field,
                        })
                    })?;
                    Ok(Box::new(sorted) as Stage)
                })))
            }
            NodeKind::Reduce { reducer, keys } => {
                let input = self.parent_stage(node, sources)?;
                Box::new(ReduceStage::new(
                    input,
                    Arc::clone(reducer),
                    Arc::clone(keys),
                    label,
                    self.metrics.clone(),
                ))
            }
            NodeKind::Join {
                joiner,
                keys,
                right,
            } => {
                let left = self.parent_stage(node, sources)?;
                let right = self.build(right, sources)?;
                Box::new(JoinStage::new(
                    left,
                    right,
                    Arc::clone(joiner),
                    Arc::clone(keys),
                    label,
                    self.metrics.clone(),
                ))
            }
        };
        Ok(stage)
    }
}

/// Stage whose upstream is opened on the first pull.
struct Deferred {
    open: Option<OpenStage>,
    inner: Option<Stage>,
}

impl Deferred {
    fn new(open: OpenStage) -> Self {
        Self {
            open: Some(open),
            inner: None,
        }
    }
}

impl Iterator for Deferred {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(open) = self.open.take() {
            match open() {
                Ok(stage) => self.inner = Some(stage),
                Err(e) => return Some(Err(e)),
            }
        }
        self.inner.as_mut()?.next()
    }
}

/// Lazy output of a graph run.
///
/// The stream fails fast: after yielding its first `Err` it releases every
/// stage (and any temporary sort storage) and yields `None` from then on.
pub struct RecordStream {
    stage: Option<Stage>,
    metrics: Option<MetricsCollector>,
    emitted: u64,
}

impl RecordStream {
    /// Drain the stream into a vector, stopping at the first error.
    ///
    /// # Errors
    /// The first error raised by the run.
    pub fn collect_records(self) -> Result<Vec<Record>> {
        self.collect()
    }

    fn finish(&mut self) {
        self.stage = None;
        if let Some(m) = &self.metrics {
            m.increment_counter("records.emitted", self.emitted);
            m.record_end();
        }
        debug!(records = self.emitted, "graph run finished");
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.stage.as_mut()?.next();
        match item {
            Some(Ok(record)) => {
                self.emitted += 1;
                Some(Ok(record))
            }
            Some(Err(e)) => {
                debug!(error = %e, "graph run failed");
                self.finish();
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}
