//! Testing utilities for computation graphs.
//!
//! This module helps end-users test their own graphs and operations:
//!
//! - **Assertions**: compare record outputs, in order or ignoring order, and
//!   compare floats approximately with [`assert_approx_eq!`](crate::assert_approx_eq)
//! - **Fixtures**: small corpora and road datasets with hand-checked results
//! - **Mock I/O**: temporary JSONL files and directories
//! - **Counting sources**: observe how many records a run actually pulled
//!
//! # Quick Start
//!
//! ```
//! use compgraph::testing::*;
//! use compgraph::{Graph, Sources, record};
//! use compgraph::operations::mappers::LowerCase;
//!
//! let mut sources = Sources::new();
//! sources.bind_vec("docs", vec![record! { "text" => "Hi" }]);
//! let out = Graph::from_source("docs")
//!     .map(LowerCase::new("text"))
//!     .run(&sources)?
//!     .collect_records()?;
//! assert_records_equal(&out, &[record! { "text" => "hi" }]);
//! # Ok::<(), compgraph::Error>(())
//! ```

pub mod assertions;
pub mod fixtures;

#[cfg(feature = "io-jsonl")]
pub mod mock_io;

pub use assertions::*;
pub use fixtures::*;

#[cfg(feature = "io-jsonl")]
pub use mock_io::*;

use crate::record::Record;
use crate::sources::Sources;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counters for a source bound with [`bind_counting`].
#[derive(Clone, Default, Debug)]
pub struct PullCounter {
    opened: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl PullCounter {
    /// How many times the source factory was invoked.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// How many records were pulled from the source, over all invocations.
    #[must_use]
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

/// Bind `name` to `records`, counting factory invocations and pulled records.
///
/// ```
/// use compgraph::testing::bind_counting;
/// use compgraph::{Graph, Sources, record};
///
/// let mut sources = Sources::new();
/// let input = (0..100).map(|i| record! { "i" => i }).collect();
/// let counter = bind_counting(&mut sources, "n", input);
/// let mut out = Graph::from_source("n").run(&sources)?;
/// assert_eq!(counter.opened(), 0);
/// out.next();
/// assert_eq!((counter.opened(), counter.pulled()), (1, 1));
/// # Ok::<(), compgraph::Error>(())
/// ```
pub fn bind_counting(sources: &mut Sources, name: &str, records: Vec<Record>) -> PullCounter {
    let counter = PullCounter::default();
    let records = Arc::new(records);
    let handle = counter.clone();
    sources.bind_fallible(name, move || -> anyhow::Result<_> {
        handle.opened.fetch_add(1, Ordering::SeqCst);
        let pulled = Arc::clone(&handle.pulled);
        let records = Arc::clone(&records);
        Ok((0..records.len()).map(move |i| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(records[i].clone())
        }))
    });
    counter
}
