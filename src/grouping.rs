//! Grouping driver shared by Reduce and Join stages.
//!
//! A [`GroupCursor`] walks a stream that is already ordered by its key fields
//! and hands it out one run of equal keys at a time. It keeps exactly one record
//! of lookahead: the first record whose key differs from the current group ends
//! that group and becomes the head of the next one.
//!
//! Order is checked as records arrive. A key smaller than the key of the group
//! before it means the input was not sorted and fails the run with
//! [`Error::OrderingViolation`]. An empty key list makes the whole stream a single
//! group.

use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::node_id::NodeLabel;
use crate::operations::{Joiner, Reducer};
use crate::record::Record;
use crate::runner::Stage;
use crate::value::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::vec;
use tracing::trace;

/// Render a key tuple for error messages.
fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// Sorted stream plus the key names it is grouped by.
pub(crate) struct GroupCursor {
    input: Stage,
    keys: Arc<[String]>,
    node: NodeLabel,
    peeked: Option<(Vec<Value>, Record)>,
    last_key: Option<Vec<Value>>,
    error: Option<Error>,
    exhausted: bool,
}

impl GroupCursor {
    pub(crate) fn new(input: Stage, keys: Arc<[String]>, node: NodeLabel) -> Self {
        Self {
            input,
            keys,
            node,
            peeked: None,
            last_key: None,
            error: None,
            exhausted: false,
        }
    }

    /// Fill the lookahead slot if it is empty and the input is still live.
    fn load(&mut self) {
        if self.peeked.is_some() || self.exhausted {
            return;
        }
        let record = match self.input.next() {
            None => {
                self.exhausted = true;
                return;
            }
            Some(Err(e)) => {
                self.fail(e);
                return;
            }
            Some(Ok(record)) => record,
        };
        let key = match record.key(&self.keys[..]) {
            Ok(key) => key,
            Err(field) => {
                let node = self.node.clone();
                self.fail(Error::MissingKey { node, field });
                return;
            }
        };
        if let Some(previous) = self.last_key.as_deref().filter(|p| key.as_slice() < *p) {
            let err = Error::OrderingViolation {
                node: self.node.clone(),
                keys: self.keys.to_vec(),
                previous: format_key(previous),
                current: format_key(&key),
            };
            self.fail(err);
            return;
        }
        self.peeked = Some((key, record));
    }

    fn fail(&mut self, error: Error) {
        self.error = Some(error);
        self.exhausted = true;
    }

    /// Key of the next record, or `None` at end of input.
    pub(crate) fn peek_key(&mut self) -> Result<Option<Vec<Value>>> {
        self.load();
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        Ok(self.peeked.as_ref().map(|(key, _)| key.clone()))
    }

    /// Open a group keyed by the current lookahead record.
    pub(crate) fn start_group(&mut self) {
        self.load();
        if let Some((key, _)) = &self.peeked {
            self.last_key = Some(key.clone());
        }
    }

    fn next_in_group(&mut self) -> Option<Record> {
        self.load();
        match (&self.peeked, &self.last_key) {
            (Some((key, _)), Some(current)) if key == current => {
                self.peeked.take().map(|(_, record)| record)
            }
            _ => None,
        }
    }

    /// Discard what is left of the current group and surface any upstream
    /// error that cut it short.
    pub(crate) fn finish_group(&mut self) -> Result<()> {
        while self.next_in_group().is_some() {}
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Buffer the whole next group.
    pub(crate) fn collect_group(&mut self) -> Result<Vec<Record>> {
        self.start_group();
        let mut rows = Vec::new();
        while let Some(record) = self.next_in_group() {
            rows.push(record);
        }
        self.finish_group()?;
        Ok(rows)
    }
}

enum GroupSource<'a> {
    Cursor(&'a mut GroupCursor),
    Records(vec::IntoIter<Record>),
}

/// Lazy iterator over one group of records sharing the same key values.
///
/// Groups handed to a [`Reducer`] borrow the stage's input and pull from it on
/// demand. [`Group::from_records`] builds a detached group, which is handy for
/// testing reducers on their own.
pub struct Group<'a> {
    source: GroupSource<'a>,
}

impl<'a> Group<'a> {
    pub(crate) fn new(cursor: &'a mut GroupCursor) -> Self {
        Self {
            source: GroupSource::Cursor(cursor),
        }
    }

    /// A group backed by an owned list of records.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Group<'static> {
        Group {
            source: GroupSource::Records(records.into_iter()),
        }
    }
}

impl Iterator for Group<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        match &mut self.source {
            GroupSource::Cursor(cursor) => cursor.next_in_group(),
            GroupSource::Records(records) => records.next(),
        }
    }
}

/// Runs a reducer once per group of its sorted input.
pub(crate) struct ReduceStage {
    cursor: GroupCursor,
    reducer: Arc<dyn Reducer>,
    keys: Arc<[String]>,
    node: NodeLabel,
    pending: vec::IntoIter<Record>,
    metrics: Option<MetricsCollector>,
}

impl ReduceStage {
    pub(crate) fn new(
        input: Stage,
        reducer: Arc<dyn Reducer>,
        keys: Arc<[String]>,
        node: NodeLabel,
        metrics: Option<MetricsCollector>,
    ) -> Self {
        Self {
            cursor: GroupCursor::new(input, Arc::clone(&keys), node.clone()),
            reducer,
            keys,
            node,
            pending: Vec::new().into_iter(),
            metrics,
        }
    }
}

impl Iterator for ReduceStage {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            match self.cursor.peek_key() {
                Err(e) => return Some(Err(e)),
                Ok(None) => return None,
                Ok(Some(_)) => {}
            }
            self.cursor.start_group();
            let reduced = self
                .reducer
                .reduce(&self.keys, &mut Group::new(&mut self.cursor));
            // an upstream failure inside the group outranks whatever the reducer
            // made of the truncated group
            if let Err(e) = self.cursor.finish_group() {
                return Some(Err(e));
            }
            match reduced {
                Ok(out) => {
                    if let Some(m) = &self.metrics {
                        m.increment_counter("reduce.groups", 1);
                    }
                    self.pending = out.into_iter();
                }
                Err(e) => return Some(Err(Error::operation(&self.node, e))),
            }
        }
    }
}

enum Side {
    Left,
    Right,
    Both,
}

/// Sort-merge join of two streams ordered by the same keys.
///
/// Only the current right-hand group is buffered; left-hand records stream
/// through the joiner one at a time.
pub(crate) struct JoinStage {
    left: GroupCursor,
    right: GroupCursor,
    joiner: Arc<dyn Joiner>,
    keys: Arc<[String]>,
    node: NodeLabel,
    right_group: Vec<Record>,
    in_left_group: bool,
    pending: vec::IntoIter<Record>,
    metrics: Option<MetricsCollector>,
}

impl JoinStage {
    pub(crate) fn new(
        left: Stage,
        right: Stage,
        joiner: Arc<dyn Joiner>,
        keys: Arc<[String]>,
        node: NodeLabel,
        metrics: Option<MetricsCollector>,
    ) -> Self {
        Self {
            left: GroupCursor::new(left, Arc::clone(&keys), node.clone()),
            right: GroupCursor::new(right, Arc::clone(&keys), node.clone()),
            joiner,
            keys,
            node,
            right_group: Vec::new(),
            in_left_group: false,
            pending: Vec::new().into_iter(),
            metrics,
        }
    }

    fn next_side(&mut self) -> Result<Option<Side>> {
        let left = self.left.peek_key()?;
        let right = self.right.peek_key()?;
        Ok(match (left, right) {
            (None, None) => None,
            (Some(_), None) => Some(Side::Left),
            (None, Some(_)) => Some(Side::Right),
            (Some(l), Some(r)) => Some(match l.cmp(&r) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => Side::Both,
            }),
        })
    }
}

impl Iterator for JoinStage {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }

            if self.in_left_group {
                if let Some(left) = Group::new(&mut self.left).next() {
                    match self.joiner.join(&self.keys, &left, &self.right_group) {
                        Ok(out) => self.pending = out.into_iter(),
                        Err(e) => return Some(Err(Error::operation(&self.node, e))),
                    }
                    continue;
                }
                self.in_left_group = false;
                self.right_group.clear();
                if let Err(e) = self.left.finish_group() {
                    return Some(Err(e));
                }
                continue;
            }

            let side = match self.next_side() {
                Ok(Some(side)) => side,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            match side {
                Side::Left => {
                    self.right_group.clear();
                    self.left.start_group();
                    self.in_left_group = true;
                }
                Side::Right => {
                    let group = match self.right.collect_group() {
                        Ok(group) => group,
                        Err(e) => return Some(Err(e)),
                    };
                    match self.joiner.right_only(&self.keys, &group) {
                        Ok(out) => self.pending = out.into_iter(),
                        Err(e) => return Some(Err(Error::operation(&self.node, e))),
                    }
                }
                Side::Both => {
                    self.right_group = match self.right.collect_group() {
                        Ok(group) => group,
                        Err(e) => return Some(Err(e)),
                    };
                    trace!(node = %self.node, size = self.right_group.len(), "join group buffered");
                    if let Some(m) = &self.metrics {
                        m.record_max("join.peak_group", self.right_group.len() as u64);
                    }
                    self.left.start_group();
                    self.in_left_group = true;
                }
            }
        }
    }
}
