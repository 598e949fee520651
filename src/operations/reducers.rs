//! Ready-made grouped folds.
//!
//! Reducers that emit one record per group start it from the group-key fields of
//! the group's first record, then add their result column.

use crate::grouping::Group;
use crate::operations::Reducer;
use crate::record::Record;
use crate::value::Value;
use anyhow::{Result, anyhow, bail};
use indexmap::IndexMap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Emits the first record of each group.
#[derive(Clone, Copy, Debug, Default)]
pub struct First;

impl Reducer for First {
    fn reduce(&self, _group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        Ok(rows.next().into_iter().collect())
    }
}

/// Group keys plus the number of records in the group.
#[derive(Clone, Debug)]
pub struct Count {
    column: String,
}

impl Count {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Count {
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let Some(first) = rows.next() else {
            return Ok(Vec::new());
        };
        let count = 1 + rows.count();
        let mut out = first.project(group_keys)?;
        out.insert(self.column.as_str(), count);
        Ok(vec![out])
    }
}

/// A single `{column: n}` record per group, without the group keys.
///
/// With no group keys this counts the whole stream.
#[derive(Clone, Debug)]
pub struct CountRows {
    column: String,
}

impl CountRows {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for CountRows {
    fn reduce(&self, _group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let mut out = Record::new();
        out.insert(self.column.as_str(), rows.count());
        Ok(vec![out])
    }
}

/// Running numeric total; integral while every input is an integer.
enum Total {
    Int(i64),
    Float(f64),
}

impl Total {
    fn add(self, value: &Value, column: &str) -> Result<Self> {
        Ok(match (self, value) {
            (Self::Int(acc), Value::Int(x)) => Self::Int(
                acc.checked_add(*x)
                    .ok_or_else(|| anyhow!("integer overflow summing `{column}`"))?,
            ),
            (total, other) => {
                let Some(x) = other.as_f64() else {
                    bail!("field `{column}`: expected number, got {}", other.type_name());
                };
                Self::Float(total.as_f64() + x)
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    const fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }
}

impl From<Total> for Value {
    fn from(total: Total) -> Self {
        match total {
            Total::Int(i) => Self::Int(i),
            Total::Float(f) => Self::Float(f),
        }
    }
}

/// Sums a numeric column per group, writing the total back under the same name.
#[derive(Clone, Debug)]
pub struct Sum {
    column: String,
}

impl Sum {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Sum {
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let Some(first) = rows.next() else {
            return Ok(Vec::new());
        };
        let mut total = Total::Int(0).add(first.require(&self.column)?, &self.column)?;
        for row in rows {
            total = total.add(row.require(&self.column)?, &self.column)?;
        }
        let mut out = first.project(group_keys)?;
        out.insert(self.column.as_str(), total);
        Ok(vec![out])
    }
}

/// Arithmetic mean of a numeric column per group, under the same name.
#[derive(Clone, Debug)]
pub struct Mean {
    column: String,
}

impl Mean {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Mean {
    #[allow(clippy::cast_precision_loss)]
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let Some(first) = rows.next() else {
            return Ok(Vec::new());
        };
        let mut sum = first.f64_field(&self.column)?;
        let mut count = 1usize;
        for row in rows {
            sum += row.f64_field(&self.column)?;
            count += 1;
        }
        let mut out = first.project(group_keys)?;
        out.insert(self.column.as_str(), sum / count as f64);
        Ok(vec![out])
    }
}

/// Candidate for [`TopN`]: larger values rank higher, then earlier arrivals.
struct Ranked {
    value: Value,
    seq: usize,
    record: Record,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// The `n` records with the largest `column` values, largest first. Records
/// with equal values keep their input order.
///
/// Holds at most `n + 1` records of the group at a time.
#[derive(Clone, Debug)]
pub struct TopN {
    column: String,
    n: usize,
}

impl TopN {
    pub fn new(column: impl Into<String>, n: usize) -> Self {
        Self {
            column: column.into(),
            n,
        }
    }
}

impl Reducer for TopN {
    fn reduce(&self, _group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        if self.n == 0 {
            return Ok(Vec::new());
        }
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(self.n + 1);
        for (seq, record) in rows.enumerate() {
            let value = record.require(&self.column)?.clone();
            heap.push(Reverse(Ranked { value, seq, record }));
            if heap.len() > self.n {
                heap.pop();
            }
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.record)
            .collect())
    }
}

/// Share of each word among the records of a group, as group keys plus the
/// word and its frequency. Words are emitted in order of first appearance.
#[derive(Clone, Debug)]
pub struct TermFrequency {
    words_column: String,
    result: String,
}

impl TermFrequency {
    pub fn new(words_column: impl Into<String>) -> Self {
        Self {
            words_column: words_column.into(),
            result: "tf".to_string(),
        }
    }

    #[must_use]
    pub fn with_result_column(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }
}

impl Reducer for TermFrequency {
    #[allow(clippy::cast_precision_loss)]
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let Some(first) = rows.next() else {
            return Ok(Vec::new());
        };
        let head = first.project(group_keys)?;
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        let mut total = 0usize;
        for row in std::iter::once(first).chain(rows) {
            *counts
                .entry(row.str_field(&self.words_column)?.to_string())
                .or_insert(0) += 1;
            total += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(word, n)| {
                head.clone()
                    .with(self.words_column.as_str(), word)
                    .with(self.result.as_str(), n as f64 / total as f64)
            })
            .collect())
    }
}
