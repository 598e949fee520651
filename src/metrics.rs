//! Metrics collection and reporting for graph runs.
//!
//! Attach a [`MetricsCollector`] to a [`Runner`](crate::Runner) to observe how a
//! run used memory and storage. The engine records:
//!
//! | Name                   | Kind    | Meaning                                        |
//! |------------------------|---------|------------------------------------------------|
//! | `sort.chunks_spilled`  | counter | sorted chunks written to temporary storage     |
//! | `sort.records_spilled` | counter | records written to temporary storage           |
//! | `sort.peak_buffered`   | gauge   | most records held by one sort buffer           |
//! | `join.peak_group`      | gauge   | largest right-hand group buffered by a join    |
//! | `reduce.groups`        | counter | groups handed to reducers                      |
//! | `records.emitted`      | counter | records yielded by finished runs               |
//!
//! Gauges are high-water marks: [`MetricsCollector::record_max`] only ever raises
//! them. Users can register their own [`Metric`]s alongside the built-in ones.
//!
//! # Example
//!
//! ```
//! use compgraph::metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! metrics.increment_counter("sort.chunks_spilled", 2);
//! metrics.record_max("sort.peak_buffered", 10);
//! metrics.record_max("sort.peak_buffered", 4);
//! assert_eq!(metrics.counter("sort.chunks_spilled"), Some(2));
//! assert_eq!(metrics.gauge("sort.peak_buffered"), Some(10));
//! ```

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Trait for custom metrics.
pub trait Metric: Send + Sync {
    /// The name of this metric (e.g., `documents_seen`).
    fn name(&self) -> &str;

    /// The current value of this metric as a JSON value.
    fn value(&self) -> Value;

    /// Optional description of what this metric measures.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// Thread-safe, cheaply cloneable container for run metrics.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Default)]
struct MetricsCollectorInner {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    custom: BTreeMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a custom metric, replacing any metric with the same name.
    pub fn register(&self, metric: Box<dyn Metric>) {
        self.lock().custom.insert(metric.name().to_string(), metric);
    }

    pub fn register_all(&self, metrics: Vec<Box<dyn Metric>>) {
        for metric in metrics {
            self.register(metric);
        }
    }

    /// Record the start of a run. Only the first call sticks.
    pub fn record_start(&self) {
        self.lock().start_time.get_or_insert_with(Instant::now);
    }

    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to a counter, creating it at zero if needed.
    pub fn increment_counter(&self, name: &str, value: u64) {
        *self.lock().counters.entry(name.to_string()).or_insert(0) += value;
    }

    pub fn set_counter(&self, name: &str, value: u64) {
        self.lock().counters.insert(name.to_string(), value);
    }

    /// Raise a high-water gauge to `value` if it is larger than the current one.
    pub fn record_max(&self, name: &str, value: u64) {
        let mut inner = self.lock();
        let slot = inner.gauges.entry(name.to_string()).or_insert(0);
        *slot = (*slot).max(value);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.lock().counters.get(name).copied()
    }

    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.lock().gauges.get(name).copied()
    }

    /// All metric names and values.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let inner = self.lock();
        let mut out = BTreeMap::new();
        for (name, v) in &inner.counters {
            out.insert(name.clone(), json!(v));
        }
        for (name, v) in &inner.gauges {
            out.insert(name.clone(), json!(v));
        }
        for (name, metric) in &inner.custom {
            out.insert(name.clone(), metric.value());
        }
        out
    }

    /// All metrics as a JSON object, including the run time when known.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut metrics_json = serde_json::Map::new();
        for (name, value) in self.snapshot() {
            metrics_json.insert(name, value);
        }
        {
            let inner = self.lock();
            for (name, metric) in &inner.custom {
                if let Some(desc) = metric.description() {
                    metrics_json.insert(format!("{name}.description"), json!(desc));
                }
            }
        }
        if let Some(elapsed) = self.elapsed() {
            metrics_json.insert("execution_time_ms".to_string(), json!(elapsed.as_millis()));
        }
        Value::Object(metrics_json)
    }

    /// Print all metrics to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n========== Graph Metrics ==========");
        if let Some(elapsed) = self.elapsed() {
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("-----------------------------------");
        }
        for (name, value) in self.snapshot() {
            println!("{name}: {value}");
        }
        println!("===================================\n");
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

/// A fixed-value metric, handy for tagging a run with an input size or label.
pub struct GaugeMetric {
    name: String,
    value: Value,
    description: Option<String>,
}

impl GaugeMetric {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Metric for GaugeMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
