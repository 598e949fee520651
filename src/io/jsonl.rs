//! JSON Lines (JSONL) record I/O.
//!
//! - [`read_jsonl_records`] streams a file as records, one JSON object per line.
//! - [`write_jsonl_records`] drains a record stream into a file.
//!
//! Empty or whitespace-only lines are skipped on read. Fields are written in
//! record insertion order.

use crate::io::{LineRecords, read_records};
use crate::record::Record;
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Stream a JSONL file as records.
///
/// # Errors
/// Returns an error if the file cannot be opened. Lines that are not JSON
/// objects surface as per-line errors from the iterator.
pub fn read_jsonl_records(path: impl AsRef<Path>) -> Result<LineRecords> {
    read_records(path, Arc::new(Record::from_json_str))
}

/// Write every record of `records` as one JSON object per line.
/// Creates parent directories if needed. Returns the number of records written.
///
/// # Errors
/// Fails on the first stream error, or if the file cannot be created or
/// written. Records already written stay in the file.
pub fn write_jsonl_records<I, E>(path: impl AsRef<Path>, records: I) -> Result<usize>
where
    I: IntoIterator<Item = std::result::Result<Record, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    let mut n = 0usize;
    for record in records {
        let record = record
            .with_context(|| format!("producing record {} for {}", n + 1, path.display()))?;
        serde_json::to_writer(&mut w, &record.to_json())
            .with_context(|| format!("write {}", path.display()))?;
        w.write_all(b"\n")?;
        n += 1;
    }
    w.flush()?;
    Ok(n)
}

/// Write an in-memory slice of records as JSONL.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_jsonl_vec(path: impl AsRef<Path>, records: &[Record]) -> Result<usize> {
    write_jsonl_records(
        path,
        records.iter().cloned().map(Ok::<_, std::io::Error>),
    )
}
