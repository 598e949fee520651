//! Merge-join strategies.
//!
//! [`MergeJoiner`] merges each matching pair of left and right records into one
//! record. A non-key field present on both sides is kept twice, renamed with a
//! side suffix (`_1` for left, `_2` for right by default). What happens to
//! records without a partner depends on the [`JoinKind`].

use crate::operations::Joiner;
use crate::record::Record;
use crate::value::Value;
use anyhow::Result;

/// Which unmatched records a join keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Only matched pairs.
    Inner,
    /// Matched pairs plus unmatched left records.
    Left,
    /// Matched pairs plus unmatched right records.
    Right,
    /// Matched pairs plus unmatched records from both sides.
    Outer,
}

impl JoinKind {
    const fn keeps_left(self) -> bool {
        matches!(self, Self::Left | Self::Outer)
    }

    const fn keeps_right(self) -> bool {
        matches!(self, Self::Right | Self::Outer)
    }
}

/// Sort-merge joiner configured by a [`JoinKind`].
///
/// Unmatched records are emitted with their own fields. Fields registered with
/// [`pad_right_fields`](Self::pad_right_fields) (or
/// [`pad_left_fields`](Self::pad_left_fields)) are added as `null` to unmatched
/// left (or right) records, so that every output record has the same shape.
#[derive(Clone, Debug)]
pub struct MergeJoiner {
    kind: JoinKind,
    left_suffix: String,
    right_suffix: String,
    left_pad: Vec<String>,
    right_pad: Vec<String>,
}

impl MergeJoiner {
    #[must_use]
    pub fn new(kind: JoinKind) -> Self {
        Self {
            kind,
            left_suffix: "_1".to_string(),
            right_suffix: "_2".to_string(),
            left_pad: Vec::new(),
            right_pad: Vec::new(),
        }
    }

    #[must_use]
    pub fn inner() -> Self {
        Self::new(JoinKind::Inner)
    }

    #[must_use]
    pub fn left() -> Self {
        Self::new(JoinKind::Left)
    }

    #[must_use]
    pub fn right() -> Self {
        Self::new(JoinKind::Right)
    }

    #[must_use]
    pub fn outer() -> Self {
        Self::new(JoinKind::Outer)
    }

    #[must_use]
    pub const fn kind(&self) -> JoinKind {
        self.kind
    }

    #[must_use]
    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_suffix = left.into();
        self.right_suffix = right.into();
        self
    }

    /// Right-side fields to add as `null` to unmatched left records.
    #[must_use]
    pub fn pad_right_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.right_pad = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Left-side fields to add as `null` to unmatched right records.
    #[must_use]
    pub fn pad_left_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.left_pad = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Merge one matched pair.
    #[must_use]
    pub fn merge(&self, join_keys: &[String], left: &Record, right: &Record) -> Record {
        let is_key = |field: &str| join_keys.iter().any(|k| k == field);
        let mut out = Record::new();
        for (field, value) in left {
            if right.contains(field) && !is_key(field) {
                out.insert(format!("{field}{}", self.left_suffix), value.clone());
            } else {
                out.insert(field.as_str(), value.clone());
            }
        }
        for (field, value) in right {
            if left.contains(field) && !is_key(field) {
                out.insert(format!("{field}{}", self.right_suffix), value.clone());
            } else {
                out.insert(field.as_str(), value.clone());
            }
        }
        out
    }

    fn pad(record: &Record, fields: &[String]) -> Record {
        let mut out = record.clone();
        for field in fields {
            if !out.contains(field) {
                out.insert(field.as_str(), Value::Null);
            }
        }
        out
    }
}

impl Joiner for MergeJoiner {
    fn join(&self, join_keys: &[String], left: &Record, right: &[Record]) -> Result<Vec<Record>> {
        if right.is_empty() {
            return Ok(if self.kind.keeps_left() {
                vec![Self::pad(left, &self.right_pad)]
            } else {
                Vec::new()
            });
        }
        Ok(right
            .iter()
            .map(|r| self.merge(join_keys, left, r))
            .collect())
    }

    fn right_only(&self, _join_keys: &[String], right: &[Record]) -> Result<Vec<Record>> {
        if !self.kind.keeps_right() {
            return Ok(Vec::new());
        }
        Ok(right.iter().map(|r| Self::pad(r, &self.left_pad)).collect())
    }

    fn name(&self) -> &'static str {
        match self.kind {
            JoinKind::Inner => "InnerJoin",
            JoinKind::Left => "LeftJoin",
            JoinKind::Right => "RightJoin",
            JoinKind::Outer => "OuterJoin",
        }
    }
}
