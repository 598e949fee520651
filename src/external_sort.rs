//! Bounded-memory external merge sort.
//!
//! [`external_sort`] orders an arbitrarily long stream by a key while holding at
//! most [`SortConfig::memory_limit`] items in memory. When the buffer fills up it
//! is sorted and written to a temporary directory as a *run*; once the input is
//! exhausted all runs, plus whatever is still buffered, are merged with a k-way
//! heap merge. At most [`MAX_FAN_IN`] runs are open at once; when more were
//! written, adjacent runs are first merged into longer ones.
//!
//! The sort is stable: items with equal keys come out in input order, whether or
//! not anything was spilled. Runs are files of length-prefixed `postcard` frames
//! living in a [`tempfile::TempDir`] owned by the returned [`SortedStream`];
//! dropping the stream (finished, failed or abandoned) removes them.
//!
//! ```
//! use compgraph::external_sort::{SortConfig, external_sort};
//!
//! let config = SortConfig::default().with_memory_limit(2);
//! let input = vec![5, 3, 9, 1, 7].into_iter().map(Ok);
//! let sorted: Vec<i32> = external_sort(input, |x: &i32| Ok(*x), &config)?
//!     .collect::<compgraph::Result<_>>()?;
//! assert_eq!(sorted, vec![1, 3, 5, 7, 9]);
//! # Ok::<(), compgraph::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::vec;
use tempfile::TempDir;
use tracing::debug;

/// Memory budget and storage location for external sorting.
#[derive(Clone, Debug)]
pub struct SortConfig {
    /// Maximum number of items buffered in memory. Zero is treated as one.
    pub memory_limit: usize,
    /// Parent directory for temporary runs; the system temp dir when `None`.
    pub spill_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            memory_limit: 65_536,
            spill_dir: None,
        }
    }
}

impl SortConfig {
    #[must_use]
    pub const fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    #[must_use]
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }
}

/// Sort `input` by `key` using at most `config.memory_limit` buffered items.
///
/// # Errors
/// Upstream and key-selector errors are returned unchanged. Failing to create,
/// write or read temporary storage yields [`Error::Resource`].
pub fn external_sort<T, K, I, F>(
    input: I,
    key: F,
    config: &SortConfig,
) -> Result<SortedStream<T, K>>
where
    I: IntoIterator<Item = Result<T>>,
    F: FnMut(&T) -> Result<K>,
    T: Serialize + DeserializeOwned,
    K: Ord + Serialize + DeserializeOwned,
{
    ExternalSorter::new(config.clone()).sort(input, key)
}

/// Most runs merged at once, counting the run being written by an
/// intermediate pass. Larger spills are merged in several passes, so open
/// files and the merge heap stay bounded whatever the input length.
pub const MAX_FAN_IN: usize = 64;

/// External sorter with optional metrics reporting.
pub struct ExternalSorter {
    config: SortConfig,
    metrics: Option<MetricsCollector>,
}

impl ExternalSorter {
    #[must_use]
    pub const fn new(config: SortConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Report `sort.*` counters and gauges to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    /// See [`external_sort`].
    pub fn sort<T, K, I, F>(&self, input: I, mut key: F) -> Result<SortedStream<T, K>>
    where
        I: IntoIterator<Item = Result<T>>,
        F: FnMut(&T) -> Result<K>,
        T: Serialize + DeserializeOwned,
        K: Ord + Serialize + DeserializeOwned,
    {
        let limit = self.config.memory_limit.max(1);
        let mut buffer: Vec<(K, T)> = Vec::new();
        let mut spill: Option<SpillDir> = None;
        let mut peak = 0;

        for item in input {
            let item = item?;
            let k = key(&item)?;
            if buffer.len() == limit {
                if spill.is_none() {
                    spill = Some(SpillDir::create(&self.config)?);
                }
                if let Some(dir) = spill.as_mut() {
                    let written = dir.write_run(&mut buffer)?;
                    if let Some(m) = &self.metrics {
                        m.increment_counter("sort.chunks_spilled", 1);
                        m.increment_counter("sort.records_spilled", written as u64);
                    }
                }
            }
            buffer.push((k, item));
            peak = peak.max(buffer.len());
        }
        if let Some(m) = &self.metrics {
            m.record_max("sort.peak_buffered", peak as u64);
        }

        sort_stable(&mut buffer);
        let Some(mut dir) = spill else {
            return Ok(SortedStream {
                state: State::Memory(buffer.into_iter()),
            });
        };

        // The in-memory buffer takes one slot of the final merge.
        let passes = dir.merge_runs::<K, T>(MAX_FAN_IN - 1, self.metrics.as_ref())?;
        if let Some(m) = &self.metrics {
            if passes > 0 {
                m.increment_counter("sort.merge_passes", passes as u64);
            }
            m.record_max("sort.peak_open_runs", dir.runs.len() as u64);
        }

        debug!(runs = dir.runs.len() + 1, passes, "merging sorted runs");
        let merge = RunMerge::open(&dir.runs, Some(buffer.into_iter()))?;
        Ok(SortedStream {
            state: State::Merge(merge, dir.dir),
        })
    }
}

fn sort_stable<K: Ord, T>(buffer: &mut [(K, T)]) {
    buffer.sort_by(|a, b| a.0.cmp(&b.0));
}

fn encode_error(e: postcard::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Temporary directory holding the runs written by one sort.
struct SpillDir {
    dir: TempDir,
    runs: Vec<PathBuf>,
    next_id: usize,
}

impl SpillDir {
    fn create(config: &SortConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("compgraph-sort-");
        let dir = match &config.spill_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::resource("create spill directory", e))?;
        Ok(Self {
            dir,
            runs: Vec::new(),
            next_id: 0,
        })
    }

    fn next_path(&mut self) -> PathBuf {
        let path = self.dir.path().join(format!("run-{:05}.bin", self.next_id));
        self.next_id += 1;
        path
    }

    /// Sort and drain `buffer` into a new run file. Returns the record count.
    fn write_run<K, T>(&mut self, buffer: &mut Vec<(K, T)>) -> Result<usize>
    where
        K: Ord + Serialize,
        T: Serialize,
    {
        sort_stable(buffer);
        let path = self.next_path();
        let count = write_frames(&path, buffer.drain(..).map(Ok))?;
        debug!(run = self.runs.len(), records = count, "spilled sorted run");
        self.runs.push(path);
        Ok(count)
    }

    /// Merge adjacent runs, `MAX_FAN_IN - 1` at a time, until at most `keep`
    /// remain. Returns the number of passes made.
    fn merge_runs<K, T>(&mut self, keep: usize, metrics: Option<&MetricsCollector>) -> Result<usize>
    where
        K: Ord + Serialize + DeserializeOwned,
        T: Serialize + DeserializeOwned,
    {
        let mut passes = 0;
        while self.runs.len() > keep {
            let previous = std::mem::take(&mut self.runs);
            for group in previous.chunks(MAX_FAN_IN - 1) {
                if let [single] = group {
                    self.runs.push(single.clone());
                    continue;
                }
                if let Some(m) = metrics {
                    m.record_max("sort.peak_open_runs", group.len() as u64 + 1);
                }
                let path = self.next_path();
                let mut merge = RunMerge::<K, T>::open(group, None)?;
                let entries = std::iter::from_fn(|| merge.next_entry().transpose());
                let count = write_frames(&path, entries)?;
                drop(merge);
                for input in group {
                    fs::remove_file(input).map_err(|e| {
                        Error::resource(format!("remove run {}", input.display()), e)
                    })?;
                }
                self.runs.push(path);
                debug!(inputs = group.len(), records = count, "merged runs");
            }
            passes += 1;
        }
        Ok(passes)
    }
}

/// Write `(key, item)` pairs to `path` as length-prefixed postcard frames.
fn write_frames<K, T, I>(path: &Path, entries: I) -> Result<usize>
where
    K: Serialize,
    T: Serialize,
    I: IntoIterator<Item = Result<(K, T)>>,
{
    let context = || format!("write run {}", path.display());
    let file = File::create(path).map_err(|e| Error::resource(context(), e))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;
    for entry in entries {
        let (key, item) = entry?;
        let frame = postcard::to_allocvec(&(&key, &item))
            .map_err(|e| Error::resource(context(), encode_error(e)))?;
        let len = u32::try_from(frame.len()).map_err(|_| {
            Error::resource(
                context(),
                io::Error::new(io::ErrorKind::InvalidInput, "record frame exceeds 4 GiB"),
            )
        })?;
        writer
            .write_all(&len.to_le_bytes())
            .and_then(|()| writer.write_all(&frame))
            .map_err(|e| Error::resource(context(), e))?;
        count += 1;
    }
    writer.flush().map_err(|e| Error::resource(context(), e))?;
    Ok(count)
}

enum Run<K, T> {
    File(BufReader<File>),
    Memory(vec::IntoIter<(K, T)>),
}

impl<K: DeserializeOwned, T: DeserializeOwned> Run<K, T> {
    fn next_entry(&mut self) -> Result<Option<(K, T)>> {
        match self {
            Self::Memory(items) => Ok(items.next()),
            Self::File(reader) => read_frame(reader).map_err(|e| Error::resource("read run", e)),
        }
    }
}

fn read_frame<K: DeserializeOwned, T: DeserializeOwned>(
    reader: &mut BufReader<File>,
) -> io::Result<Option<(K, T)>> {
    if reader.fill_buf()?.is_empty() {
        return Ok(None);
    }
    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let mut frame = vec![0u8; u32::from_le_bytes(len) as usize];
    reader.read_exact(&mut frame)?;
    postcard::from_bytes(&frame).map(Some).map_err(encode_error)
}

/// Heap slot; ordered so that `BinaryHeap` pops the smallest key first and, on
/// ties, the earliest run.
struct HeapEntry<K, T> {
    key: K,
    run: usize,
    item: T,
}

impl<K: Ord, T> Ord for HeapEntry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.run.cmp(&self.run))
    }
}

impl<K: Ord, T> PartialOrd for HeapEntry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> PartialEq for HeapEntry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, T> Eq for HeapEntry<K, T> {}

/// K-way heap merge over runs listed in input order.
struct RunMerge<K, T> {
    runs: Vec<Run<K, T>>,
    heap: BinaryHeap<HeapEntry<K, T>>,
}

impl<K, T> RunMerge<K, T>
where
    K: Ord + DeserializeOwned,
    T: DeserializeOwned,
{
    fn open(paths: &[PathBuf], tail: Option<vec::IntoIter<(K, T)>>) -> Result<Self> {
        let mut runs = Vec::with_capacity(paths.len() + 1);
        for path in paths {
            let file = File::open(path)
                .map_err(|e| Error::resource(format!("open run {}", path.display()), e))?;
            runs.push(Run::File(BufReader::new(file)));
        }
        runs.extend(tail.map(Run::Memory));

        let mut heap = BinaryHeap::with_capacity(runs.len());
        for (index, run) in runs.iter_mut().enumerate() {
            if let Some((key, item)) = run.next_entry()? {
                heap.push(HeapEntry { key, run: index, item });
            }
        }
        Ok(Self { runs, heap })
    }

    fn next_entry(&mut self) -> Result<Option<(K, T)>> {
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        if let Some((key, item)) = self.runs[entry.run].next_entry()? {
            self.heap.push(HeapEntry {
                key,
                run: entry.run,
                item,
            });
        }
        Ok(Some((entry.key, entry.item)))
    }
}

enum State<K, T> {
    Memory(vec::IntoIter<(K, T)>),
    Merge(RunMerge<K, T>, TempDir),
    Done,
}

/// Sorted output of [`external_sort`]. Owns (and on drop removes) any
/// temporary storage the sort used.
pub struct SortedStream<T, K> {
    state: State<K, T>,
}

impl<T, K> SortedStream<T, K> {
    /// Whether the sort had to spill runs to temporary storage.
    #[must_use]
    pub const fn spilled(&self) -> bool {
        matches!(self.state, State::Merge(..))
    }
}

impl<T, K> Iterator for SortedStream<T, K>
where
    T: DeserializeOwned,
    K: Ord + DeserializeOwned,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            State::Done => None,
            State::Memory(items) => items.next().map(|(_, item)| Ok(item)),
            State::Merge(merge, _) => match merge.next_entry() {
                Ok(entry) => entry.map(|(_, item)| Ok(item)),
                Err(e) => {
                    self.state = State::Done;
                    Some(Err(e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort_pairs(input: Vec<(u32, u32)>, limit: usize) -> (Vec<(u32, u32)>, bool) {
        let config = SortConfig::default().with_memory_limit(limit);
        let stream =
            external_sort(input.into_iter().map(Ok), |p: &(u32, u32)| Ok(p.0), &config).unwrap();
        let spilled = stream.spilled();
        (stream.collect::<Result<Vec<_>>>().unwrap(), spilled)
    }

    #[test]
    fn exact_fit_stays_in_memory() {
        let (out, spilled) = sort_pairs(vec![(2, 0), (1, 1), (3, 2)], 3);
        assert!(!spilled);
        assert_eq!(out, vec![(1, 1), (2, 0), (3, 2)]);
    }

    #[test]
    fn ties_keep_input_order_across_runs() {
        let input: Vec<(u32, u32)> = (0..20).map(|i| (i % 3, i)).collect();
        let (out, spilled) = sort_pairs(input.clone(), 4);
        assert!(spilled);
        let mut expected = input;
        expected.sort_by_key(|p| p.0);
        assert_eq!(out, expected);
    }

    #[test]
    fn zero_limit_is_treated_as_one() {
        let (out, spilled) = sort_pairs(vec![(3, 0), (1, 1), (2, 2)], 0);
        assert!(spilled);
        assert_eq!(out.iter().map(|p| p.0).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_touches_no_storage() {
        let config = SortConfig::default()
            .with_memory_limit(1)
            .with_spill_dir("/nonexistent/compgraph/spill");
        let stream = external_sort(Vec::<Result<u32>>::new(), |x: &u32| Ok(*x), &config).unwrap();
        assert!(!stream.spilled());
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn multi_pass_merge_keeps_ties_in_input_order() {
        let input: Vec<(u32, u32)> = (0..300).map(|i| (i % 3, i)).collect();
        let (out, spilled) = sort_pairs(input.clone(), 1);
        assert!(spilled);
        let mut expected = input;
        expected.sort_by_key(|p| p.0);
        assert_eq!(out, expected);
    }
}
