//! Operation contracts and the ready-made operation library.
//!
//! A graph stage is configured with one of five capabilities:
//!
//! | Trait          | Shape                                         | Stage          |
//! |----------------|-----------------------------------------------|----------------|
//! | [`Mapper`]     | `Record -> Record`                            | `map`          |
//! | [`FlatMapper`] | `Record -> Vec<Record>`                       | `flat_map`     |
//! | [`Predicate`]  | `&Record -> bool`                             | `filter`       |
//! | [`Reducer`]    | one key group `-> Vec<Record>`                | `reduce`       |
//! | [`Joiner`]     | left record, right group `-> Vec<Record>`     | `join`         |
//!
//! Operations must be pure with respect to the records they see: they may carry
//! configuration but no state from one call (or group) to the next. Failures are
//! returned as [`anyhow::Error`]; the engine attaches the node identity.
//!
//! Plain closures implement the element-wise contracts:
//!
//! ```
//! use compgraph::{Graph, Record};
//!
//! let g = Graph::from_source("docs")
//!     .map(|mut r: Record| -> anyhow::Result<Record> {
//!         let n = r.i64_field("n")?;
//!         r.insert("n2", n * 2);
//!         Ok(r)
//!     })
//!     .filter(|r: &Record| -> anyhow::Result<bool> { Ok(r.i64_field("n2")? > 4) });
//! # let _ = g;
//! ```
//!
//! The library instances live in [`mappers`], [`reducers`] and [`joiners`].

pub mod joiners;
pub mod mappers;
pub mod reducers;

use crate::grouping::Group;
use crate::record::Record;
use anyhow::Result;
use std::any::type_name;

/// Strip the module path from a type name for display.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    let start = head.rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}

/// One-to-one record transformation.
pub trait Mapper: Send + Sync {
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn map(&self, record: Record) -> Result<Record>;

    /// Name shown in plans and error labels.
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

/// One-to-many record transformation (tokenizers, explode-style mappers).
pub trait FlatMapper: Send + Sync {
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn flat_map(&self, record: Record) -> Result<Vec<Record>>;

    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

/// Record filter: records for which `test` returns `false` are dropped.
pub trait Predicate: Send + Sync {
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn test(&self, record: &Record) -> Result<bool>;

    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

/// Grouped fold.
///
/// `reduce` is called once per maximal run of records sharing equal values for
/// `group_keys`. The group is a lazy iterator scoped to the call; records not
/// consumed are discarded afterwards.
pub trait Reducer: Send + Sync {
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>>;

    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

/// Two-stream merge for records sharing equal `join_keys`.
///
/// The join driver buffers the current right-hand group and streams the
/// left-hand group through [`join`](Joiner::join) one record at a time, so output
/// for one call is bounded by the size of the right group. When a key exists on
/// the left only, `right` is empty; when it exists on the right only, the driver
/// calls [`right_only`](Joiner::right_only) instead. Whether unmatched records
/// are kept is the joiner's policy.
pub trait Joiner: Send + Sync {
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn join(&self, join_keys: &[String], left: &Record, right: &[Record]) -> Result<Vec<Record>>;

    /// Right-hand group with no left-hand counterpart. Dropped by default.
    ///
    /// # Errors
    /// Implementations fail when a field they need is missing or malformed.
    fn right_only(&self, join_keys: &[String], right: &[Record]) -> Result<Vec<Record>> {
        let _ = (join_keys, right);
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

impl<F> Mapper for F
where
    F: Fn(Record) -> Result<Record> + Send + Sync,
{
    fn map(&self, record: Record) -> Result<Record> {
        self(record)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

impl<F> FlatMapper for F
where
    F: Fn(Record) -> Result<Vec<Record>> + Send + Sync,
{
    fn flat_map(&self, record: Record) -> Result<Vec<Record>> {
        self(record)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

impl<F> Predicate for F
where
    F: Fn(&Record) -> Result<bool> + Send + Sync,
{
    fn test(&self, record: &Record) -> Result<bool> {
        self(record)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

impl<F> Reducer for F
where
    F: Fn(&[String], &mut Group<'_>) -> Result<Vec<Record>> + Send + Sync,
{
    fn reduce(&self, group_keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        self(group_keys, rows)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}
